use anyhow::{Result, bail};
use tracing::info;

use zeladoria_db::Database;
use zeladoria_types::models::Role;

use crate::auth::{hash_password, normalize_email, random_password};

const GENERATED_PASSWORD_LEN: usize = 20;

#[derive(Debug, PartialEq, Eq)]
pub enum AdminBootstrap {
    /// At least one admin already exists; nothing was written.
    AlreadyPresent,
    /// An admin account was created. `generated_password` is set when no
    /// password was configured and one was made up.
    Created {
        id: i64,
        generated_password: Option<String>,
    },
}

/// Startup seeding: one admin account and a non-empty issue-type catalog.
pub fn run(db: &Database, admin_email: &str, admin_password: Option<&str>) -> Result<AdminBootstrap> {
    let admin = ensure_admin(db, admin_email, admin_password)?;
    db.seed_issue_types()?;
    Ok(admin)
}

pub fn ensure_admin(db: &Database, email: &str, password: Option<&str>) -> Result<AdminBootstrap> {
    if db.count_users_with_role(Role::Admin.as_str())? > 0 {
        return Ok(AdminBootstrap::AlreadyPresent);
    }

    let email = normalize_email(email).map_err(|e| anyhow::anyhow!("Admin email: {}", e))?;
    if let Some(existing) = db.get_user_by_email(&email)? {
        bail!(
            "Cannot seed admin: {} is already registered with role '{}'",
            email,
            existing.role
        );
    }

    let (password, generated_password) = match password.filter(|p| !p.is_empty()) {
        Some(p) => (p.to_string(), None),
        None => {
            let p = random_password(GENERATED_PASSWORD_LEN);
            (p.clone(), Some(p))
        }
    };

    let id = db.create_user(&email, &hash_password(&password)?, Role::Admin.as_str(), true)?;
    info!("Seeded admin account {} ({})", id, email);

    Ok(AdminBootstrap::Created {
        id,
        generated_password,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::verify_password;

    #[test]
    fn admin_is_created_once() {
        let db = Database::open_in_memory().unwrap();

        let first = ensure_admin(&db, "admin@zeladoria.local", Some("troque-me")).unwrap();
        let AdminBootstrap::Created { id, generated_password } = first else {
            panic!("expected a new admin, got {:?}", first);
        };
        assert_eq!(generated_password, None);

        let stored = db.get_user_by_id(id).unwrap().unwrap();
        assert_eq!(stored.role, "admin");
        assert!(stored.active);
        assert!(verify_password("troque-me", &stored.password_hash).unwrap());

        assert_eq!(
            ensure_admin(&db, "admin@zeladoria.local", Some("troque-me")).unwrap(),
            AdminBootstrap::AlreadyPresent
        );
        assert_eq!(db.count_users_with_role("admin").unwrap(), 1);
    }

    #[test]
    fn missing_password_is_generated() {
        let db = Database::open_in_memory().unwrap();

        let AdminBootstrap::Created { id, generated_password: Some(password) } =
            ensure_admin(&db, "admin@zeladoria.local", None).unwrap()
        else {
            panic!("expected a generated password");
        };
        assert_eq!(password.len(), GENERATED_PASSWORD_LEN);
        let stored = db.get_user_by_id(id).unwrap().unwrap();
        assert!(verify_password(&password, &stored.password_hash).unwrap());
    }

    #[test]
    fn email_taken_by_citizen_is_an_error() {
        let db = Database::open_in_memory().unwrap();
        db.create_user("admin@zeladoria.local", "hash", "cidadao", true).unwrap();

        assert!(ensure_admin(&db, "admin@zeladoria.local", Some("x")).is_err());
    }

    #[test]
    fn run_seeds_catalog_idempotently() {
        let db = Database::open_in_memory().unwrap();

        run(&db, "admin@zeladoria.local", Some("troque-me")).unwrap();
        let types = db.count_issue_types().unwrap();
        assert!(types > 0);

        assert_eq!(
            run(&db, "admin@zeladoria.local", Some("troque-me")).unwrap(),
            AdminBootstrap::AlreadyPresent
        );
        assert_eq!(db.count_issue_types().unwrap(), types);
    }
}
