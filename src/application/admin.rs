use crate::domain::auth::User;
use crate::domain::ports::StaffDirectory;
use tracing::{debug, error};

pub const ADMIN_ROLE: &str = "admin";

/// Whether the user is staff with the admin role. Lookup failures deny.
pub async fn is_admin(directory: &dyn StaffDirectory, user: Option<&User>) -> bool {
    let Some(user) = user else {
        return false;
    };

    match directory.role_of(&user.id).await {
        Ok(role) => {
            let admin = role.as_deref() == Some(ADMIN_ROLE);
            debug!(user_id = %user.id, ?role, admin, "staff role checked");
            admin
        }
        Err(e) => {
            error!(user_id = %user.id, error = %e, "staff role lookup failed");
            false
        }
    }
}
