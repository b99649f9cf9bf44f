//! Document edits made by module toggles, domain registration and setup.

use std::collections::BTreeMap;

use ejabberd_admin::commands::{self, Command, ModuleAction};
use ejabberd_admin::document::{ConfigStore, StoreError};
use ejabberd_admin::domains::DomainError;
use ejabberd_admin::lifecycle::RestartOutcome;
use ejabberd_admin::modules::{ModuleError, ModuleStatus, MOD_MAM};

mod common;

use common::Fixture;

/// Lines of `doc` outside the `modules` block.
fn outside_modules(doc: &str) -> Vec<&str> {
    let mut inside = false;
    doc.lines()
        .filter(|line| {
            if line.starts_with("modules:") {
                inside = true;
                return false;
            }
            if inside && (line.starts_with(' ') || line.is_empty()) {
                return false;
            }
            inside = false;
            true
        })
        .collect()
}

#[tokio::test]
async fn enabling_twice_is_idempotent() {
    let fx = Fixture::new();
    let toggle = fx.context().modules();
    let before = fx.document();

    let first = toggle.enable(MOD_MAM).await.unwrap();
    assert!(first.changed);
    assert_eq!(first.restart, RestartOutcome::Restarted);
    let once = fx.document();

    let second = toggle.enable(MOD_MAM).await.unwrap();
    assert!(!second.changed);
    assert_eq!(fx.document(), once);
    assert_eq!(fx.service.calls(), vec!["restart"]);

    assert!(once.contains("  mod_mam:\n    queue_type: ram\n"));
    assert!(once.contains("    cache_life_time: 3600\n"));
    assert_eq!(outside_modules(&once), outside_modules(&before));
    assert_eq!(toggle.status(MOD_MAM).unwrap(), ModuleStatus::Enabled);
}

#[tokio::test]
async fn enable_resets_hand_edited_settings() {
    let fx = Fixture::new();
    let toggle = fx.context().modules();
    toggle.enable(MOD_MAM).await.unwrap();
    let reference = fx.document();

    fx.write_document(&reference.replace("cache_size: 1000", "cache_size: 5"));
    let report = toggle.enable(MOD_MAM).await.unwrap();

    assert!(report.changed);
    assert_eq!(fx.document(), reference);
}

#[tokio::test]
async fn disabling_twice_is_idempotent() {
    let fx = Fixture::new();
    let toggle = fx.context().modules();
    let before = fx.document();

    let first = toggle.disable("mod_roster").await.unwrap();
    assert!(first.changed);
    let once = fx.document();
    assert!(!once.contains("mod_roster"));
    assert!(once.contains("modules:\n  mod_ping: {}\n\nacl:\n"));

    let second = toggle.disable("mod_roster").await.unwrap();
    assert!(!second.changed);
    assert_eq!(second.restart, RestartOutcome::NotRunning);
    assert_eq!(fx.document(), once);
    assert_eq!(outside_modules(&once), outside_modules(&before));
    assert_eq!(toggle.status("mod_roster").unwrap(), ModuleStatus::Disabled);
}

#[tokio::test]
async fn flow_modules_are_not_reported_as_disabled() {
    let fx = Fixture::new();
    fx.write_document(&fx.document().replace(
        "modules:\n  mod_ping: {}\n  mod_roster:\n    versioning: true\n",
        "modules: {mod_ping: {}, mod_roster: {}}\n",
    ));
    let before = fx.document();
    let toggle = fx.context().modules();

    let err = toggle.disable("mod_ping").await.unwrap_err();

    assert!(matches!(err, ModuleError::Document(_)));
    assert_eq!(fx.document(), before);
    assert_eq!(toggle.status("mod_ping").unwrap(), ModuleStatus::Enabled);
    assert!(!toggle.disable("mod_absent").await.unwrap().changed);
}

#[tokio::test]
async fn list_valued_authentication_is_accepted() {
    let fx = Fixture::new();
    fx.write_document(&fx.document().replace("auth_method: internal\n", "auth_method: [internal]\n"));
    let ctx = fx.context();

    let status = commands::run(&ctx, &Command::Module {
        action: ModuleAction::Status,
        name: "mod_ping".into(),
    })
    .await
    .unwrap();
    assert_eq!(status.output.as_deref(), Some("enabled"));

    commands::run(&ctx, &Command::Setup).await.unwrap();
    assert!(fx.document().contains("auth_method: ldap\n"));
}

#[tokio::test]
async fn configured_defaults_replace_builtin_ones() {
    let fx = Fixture::new();
    let table: toml::Table = toml::from_str("db_type = \"sql\"\nassume_mam_usage = true\n").unwrap();
    let toggle = fx
        .context()
        .modules()
        .with_defaults(BTreeMap::from([(MOD_MAM.to_string(), table)]));

    toggle.enable(MOD_MAM).await.unwrap();

    let doc = fx.document();
    assert!(doc.contains("  mod_mam:\n    assume_mam_usage: true\n    db_type: sql\n"));
    assert!(!doc.contains("queue_type"));
}

#[tokio::test]
async fn invalid_module_name_is_rejected() {
    let fx = Fixture::new();
    let err = fx.context().modules().enable("mod mam").await.unwrap_err();
    assert!(matches!(err, ModuleError::InvalidName(_)));
}

#[tokio::test]
async fn domains_are_appended_and_duplicates_flagged() {
    let fx = Fixture::new();
    let registrar = fx.context().registrar();

    let first = registrar.add_domain("other.org").await.unwrap();
    assert!(!first.duplicate);
    let doc = fx.document();
    assert!(doc.starts_with("# ejabberd configuration\nhosts:\n  - chat.example.org\n  - other.org\n\nloglevel:"));

    let again = registrar.add_domain("other.org").await.unwrap();
    assert!(again.duplicate);
    assert_eq!(fx.document().matches("  - other.org\n").count(), 2);
    assert!(fx.service.calls().is_empty());
}

#[tokio::test]
async fn bad_domain_names_never_reach_the_document() {
    let fx = Fixture::new();
    let before = fx.document();

    let err = fx.context().registrar().add_domain("../../etc").await.unwrap_err();

    assert!(matches!(err, DomainError::Invalid(_)));
    assert_eq!(fx.document(), before);
}

#[tokio::test]
async fn unsupported_layout_leaves_file_untouched() {
    let fx = Fixture::new();
    let doc = "hosts: [a.org,\n        b.org]\n";
    fx.write_document(doc);

    let err = fx.context().registrar().add_domain("c.org").await.unwrap_err();

    assert!(matches!(err, DomainError::Document(_)));
    assert_eq!(fx.document(), doc);
}

#[test]
fn missing_document_is_unreadable() {
    let fx = Fixture::new();
    let store = ConfigStore::new(fx.path("etc/x/absent.yml"));
    assert!(matches!(store.load(), Err(StoreError::ConfigUnreadable { .. })));
}

#[tokio::test]
async fn setup_switches_authentication() {
    let fx = Fixture::new();
    let ctx = fx.context();

    let outcome = commands::run(&ctx, &Command::Setup).await.unwrap();
    assert_eq!(outcome.exit_code, 0);

    let doc = fx.document();
    assert!(doc.contains("auth_method: ldap\n"));
    assert!(doc.contains("ldap_servers: [\"localhost\"]\n"));
    assert!(doc.ends_with("ldap_base: ou=users,dc=yunohost,dc=org\n"));
    assert_eq!(fx.service.calls(), vec!["restart"]);

    commands::run(&ctx, &Command::Setup).await.unwrap();
    assert_eq!(fx.service.calls(), vec!["restart"]);
}
