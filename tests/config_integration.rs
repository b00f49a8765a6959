//! Configuration layering: defaults, then an explicit file, then `LARDER__` variables.

use std::env;
use std::io::Write;
use std::sync::Mutex;

use larder::config::AppConfig;

// Tests that touch the process environment must not interleave.
static ENV_MUTEX: Mutex<()> = Mutex::new(());

#[test]
fn environment_overrides_defaults() {
    let _guard = ENV_MUTEX.lock().unwrap();

    env::set_var("LARDER__SERVER__PORT", "18080");
    env::set_var("LARDER__AUTH__SERVICE_ADMIN_USERNAMES", "root,ops");
    let config = AppConfig::load_from(None);
    env::remove_var("LARDER__SERVER__PORT");
    env::remove_var("LARDER__AUTH__SERVICE_ADMIN_USERNAMES");

    let config = config.expect("load config");
    assert_eq!(config.server.port, 18080);
    assert_eq!(config.auth.service_admin_usernames, vec!["root".to_string(), "ops".to_string()]);
    assert_eq!(config.auth.cookie_name, "larder_session");
}

#[test]
fn explicit_file_is_layered_under_the_environment() {
    let _guard = ENV_MUTEX.lock().unwrap();

    let path = env::temp_dir().join(format!("larder-config-{}.toml", std::process::id()));
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "[server]\nport = 9000\nhost = \"0.0.0.0\"\n\n[meal_plans]\nfinalizer_interval_seconds = 5").unwrap();
    drop(file);

    env::set_var("LARDER__SERVER__PORT", "9100");
    let config = AppConfig::load_from(path.to_str());
    env::remove_var("LARDER__SERVER__PORT");
    std::fs::remove_file(&path).unwrap();

    let config = config.expect("load config");
    assert_eq!(config.server.port, 9100);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.meal_plans.finalizer_interval_seconds, 5);
}

#[test]
fn invalid_values_are_rejected() {
    let _guard = ENV_MUTEX.lock().unwrap();

    env::set_var("LARDER__DATABASE__MAX_CONNECTIONS", "0");
    let config = AppConfig::load_from(None);
    env::remove_var("LARDER__DATABASE__MAX_CONNECTIONS");

    assert!(config.is_err());
}
