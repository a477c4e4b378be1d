use crate::db;
use crate::domain::models::UserRole;
use anyhow::Result;
use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2,
};
use rand_core::OsRng;
use sqlx::PgPool;

/// Bootstrap an admin account from ADMIN_EMAIL / ADMIN_PASSWORD when the
/// users table has no admin yet. Without one, nobody can create accounts.
pub async fn seed_admin(pool: &PgPool) -> Result<()> {
    let (Ok(email), Ok(password)) = (std::env::var("ADMIN_EMAIL"), std::env::var("ADMIN_PASSWORD"))
    else {
        tracing::debug!("ADMIN_EMAIL/ADMIN_PASSWORD not set, skipping admin seed");
        return Ok(());
    };

    let has_admin: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE role = 'admin')")
            .fetch_one(pool)
            .await?;
    if has_admin {
        return Ok(());
    }

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("failed to hash admin password: {e}"))?
        .to_string();

    db::create_user(pool, &email, &hash, "Admin", "Admin", UserRole::Admin).await?;
    tracing::info!("seeded initial admin account {email}");
    Ok(())
}
