//! Access policy per route. Operation ids are `"<METHOD> <route pattern>"`;
//! routes not listed here require an authenticated caller.

use learnhub_auth::{PolicyTable, Role};

pub fn policy_table() -> PolicyTable {
    PolicyTable::builder()
        .public("POST /api/auth/register")
        .public("POST /api/auth/login")
        .authenticated("GET /api/auth/me")
        .public("GET /api/roles")
        .role("GET /api/admin/accounts", Role::Admin)
        .role("PUT /api/admin/accounts/:id/roles", Role::Admin)
        .role("POST /api/admin/instructors", Role::Admin)
        .public("GET /api/instructors")
        .public("GET /api/instructors/:id")
        .public("GET /api/instructors/:id/courses")
        .role("POST /api/students", Role::Admin)
        .role("GET /api/students", Role::Admin)
        .authenticated("GET /api/students/:id")
        .authenticated("GET /api/students/by-account/:account_id")
        .role("POST /api/courses", Role::Instructor)
        .public("GET /api/courses")
        .public("GET /api/courses/:id")
        .authenticated("GET /api/courses/:id/enrollments")
        .authenticated("POST /api/enrollments")
        .role("GET /api/enrollments", Role::Admin)
        .authenticated("GET /api/enrollments/:id")
        .role("PUT /api/enrollments/:id", Role::Admin)
        .authenticated("DELETE /api/enrollments/:id")
        .authenticated("GET /api/enrollments/student/:student_id")
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use learnhub_auth::AccessPolicy;

    #[test]
    fn admin_operations_require_admin() {
        let table = policy_table();
        for op in [
            "GET /api/admin/accounts",
            "PUT /api/admin/accounts/:id/roles",
            "GET /api/enrollments",
            "PUT /api/enrollments/:id",
        ] {
            assert_eq!(table.policy_for(op), AccessPolicy::RequiresRole(Role::Admin), "{op}");
        }
    }

    #[test]
    fn catalog_reads_are_public() {
        let table = policy_table();
        assert_eq!(table.policy_for("GET /api/courses"), AccessPolicy::Public);
        assert_eq!(table.policy_for("GET /api/courses/:id"), AccessPolicy::Public);
        assert_eq!(
            table.policy_for("POST /api/courses"),
            AccessPolicy::RequiresRole(Role::Instructor)
        );
    }

    #[test]
    fn unlisted_operations_need_authentication() {
        assert_eq!(
            policy_table().policy_for("PATCH /api/courses/:id"),
            AccessPolicy::Authenticated
        );
    }
}
