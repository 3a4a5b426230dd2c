
use anyhow::{bail, Result};

use crate::types::policy::AiApplication;

use super::Database;

pub fn run_all_tests(db: &Database) {
    application::run_application_tests(db);
    application::run_policy_tests(db);
    application::run_user_group_tests(db);

    vector_db::run_vector_db_tests(db);

    test_rollback(db);
}

fn test_rollback(db: &Database) {
    let result: Result<()> = db.with_transaction(|tx, _cache| {
        tx.create_application(
            AiApplication {
                id: 0,
                name: String::from("rollback"),
                application_key: String::from("rollback-key"),
                enabled: true,
            },
            None,
        )
        .unwrap();

        bail!("rollback");
    });
    assert!(result.is_err());

    db.with_transaction(|tx, _cache| {
        assert!(tx.get_application("rollback-key")?.is_none());
        Ok(())
    })
    .unwrap();
}
