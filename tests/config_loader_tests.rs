use content_pipeline::config::{ConfigError, ConfigLoader, StoreBackend};
use std::{
    env, fs,
    path::PathBuf,
    sync::{Mutex, MutexGuard, OnceLock},
};
use tempfile::TempDir;

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

fn env_guard() -> MutexGuard<'static, ()> {
    env_lock()
        .lock()
        .unwrap_or_else(|poison| poison.into_inner())
}

fn clear_env() {
    unsafe {
        env::remove_var("PIPELINE_PROFILE");
        env::remove_var("PIPELINE_API_BIND_ADDR");
        env::remove_var("PIPELINE_SERVICE_TOKEN");
    }
}

fn write_env_file(dir: &TempDir, name: &str, contents: &str) {
    let path = dir.path().join(name);
    fs::write(path, contents).unwrap();
}

fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

fn loader_in(dir: &TempDir) -> ConfigLoader {
    ConfigLoader::with_base_dir(PathBuf::from(dir.path()))
}

#[test]
fn loads_defaults_from_an_empty_directory() {
    let temp_dir = TempDir::new().unwrap();
    let cfg = loader_in(&temp_dir).load_from(Vec::new()).unwrap();

    assert_eq!(cfg.profile, "local");
    assert_eq!(cfg.api_bind_addr, "0.0.0.0:8080");
    assert_eq!(cfg.store_backend, StoreBackend::Postgrest);
    assert!(cfg.service_tokens.is_empty());
    cfg.bind_addr().expect("default bind addr parses");
}

#[test]
fn layered_env_files_apply_in_order() {
    let temp_dir = TempDir::new().unwrap();
    write_env_file(&temp_dir, ".env", "PIPELINE_API_BIND_ADDR=127.0.0.1:3000\n");
    write_env_file(
        &temp_dir,
        ".env.test",
        "PIPELINE_API_BIND_ADDR=192.168.0.10:5000\nPIPELINE_LOG_LEVEL=debug\n",
    );
    write_env_file(
        &temp_dir,
        ".env.test.local",
        "PIPELINE_API_BIND_ADDR=10.0.0.5:6000\n",
    );
    // Select profile via .env.local before profile-specific files load.
    write_env_file(
        &temp_dir,
        ".env.local",
        "PIPELINE_PROFILE=test\nPIPELINE_API_BIND_ADDR=127.0.0.1:4000\n",
    );

    let cfg = loader_in(&temp_dir).load_from(Vec::new()).unwrap();

    assert_eq!(cfg.profile, "test");
    assert_eq!(cfg.api_bind_addr, "10.0.0.5:6000");
    assert_eq!(cfg.log_level, "debug");
}

#[test]
fn process_profile_selects_profile_files() {
    let temp_dir = TempDir::new().unwrap();
    write_env_file(&temp_dir, ".env.local", "PIPELINE_PROFILE=test\n");
    write_env_file(&temp_dir, ".env.test", "PIPELINE_STORE_BACKEND=postgrest\n");
    write_env_file(&temp_dir, ".env.dev", "PIPELINE_STORE_BACKEND=memory\n");

    let cfg = loader_in(&temp_dir)
        .load_from(vars(&[("PIPELINE_PROFILE", "dev")]))
        .unwrap();

    assert_eq!(cfg.profile, "dev");
    assert_eq!(cfg.store_backend, StoreBackend::Memory);
}

#[test]
fn explicit_variables_override_every_file() {
    let temp_dir = TempDir::new().unwrap();
    write_env_file(
        &temp_dir,
        ".env",
        "PIPELINE_API_BIND_ADDR=127.0.0.1:3000\nPIPELINE_SERVICE_TOKEN=from-file\n",
    );

    let cfg = loader_in(&temp_dir)
        .load_from(vars(&[("PIPELINE_API_BIND_ADDR", "0.0.0.0:9090")]))
        .unwrap();

    assert_eq!(cfg.api_bind_addr, "0.0.0.0:9090");
    assert_eq!(cfg.service_tokens, vec!["from-file".to_string()]);
}

#[test]
fn process_environment_has_highest_precedence() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(
        &temp_dir,
        ".env",
        "PIPELINE_API_BIND_ADDR=127.0.0.1:3000\nPIPELINE_SERVICE_TOKEN=from-file\n",
    );
    unsafe {
        env::set_var("PIPELINE_API_BIND_ADDR", "0.0.0.0:9191");
    }

    let cfg = loader_in(&temp_dir).load().expect("config loads with env override");
    assert_eq!(cfg.api_bind_addr, "0.0.0.0:9191");

    clear_env();
}

#[test]
fn platform_variables_fill_in_from_dotenv() {
    let temp_dir = TempDir::new().unwrap();
    write_env_file(
        &temp_dir,
        ".env",
        "SUPABASE_URL=https://abc.supabase.co/\nSUPABASE_SECRET_API_KEY=sb-secret\nDB_API_SERVICE_TOKEN=shared-token\n",
    );

    let cfg = loader_in(&temp_dir).load_from(Vec::new()).unwrap();

    assert_eq!(cfg.store_url.as_deref(), Some("https://abc.supabase.co"));
    assert_eq!(cfg.store_api_key.as_deref(), Some("sb-secret"));
    assert_eq!(cfg.service_tokens, vec!["shared-token".to_string()]);
    cfg.validate().expect("fallback configuration is complete");
}

#[test]
fn malformed_env_file_is_reported_with_its_path() {
    let temp_dir = TempDir::new().unwrap();
    write_env_file(&temp_dir, ".env", "this line has no assignment\n");

    let err = loader_in(&temp_dir).load_from(Vec::new()).unwrap_err();

    match err {
        ConfigError::EnvFile { path, .. } => assert!(path.ends_with(".env")),
        other => panic!("expected EnvFile error, got {other:?}"),
    }
}

#[test]
fn invalid_bind_addr_returns_error() {
    let temp_dir = TempDir::new().unwrap();
    let cfg = loader_in(&temp_dir)
        .load_from(vars(&[("PIPELINE_API_BIND_ADDR", "not-an-addr")]))
        .unwrap();

    assert!(matches!(
        cfg.bind_addr(),
        Err(ConfigError::InvalidBindAddr { .. })
    ));
}
