use restflow::variable::{
    ConfigLoader, DynamicVariables, FixedClock, NamedResponseRecord, VariableState,
};
use std::fs;
use tempfile::TempDir;

/// 测试从实际配置文件加载变量
#[test]
fn test_load_config_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("restflow.toml");

    let config_content = r#"
[environments.dev]
base_url = "http://localhost:3000"
api_key = "dev-key-123"

[environments.prod]
base_url = "https://api.example.com"
api_key = "${PROD_API_KEY}"

[sandbox]
timeout_ms = 250
"#;

    fs::write(&config_path, config_content).unwrap();

    let config = ConfigLoader::load_from_path(&config_path).unwrap();
    assert!(config.environments.contains_key("dev"));
    assert!(config.environments.contains_key("prod"));
    assert_eq!(config.sandbox.timeout_ms, 250);
    assert_eq!(config.sandbox.memory_limit_mb, 64);

    let dev_env = &config.environments["dev"];
    assert_eq!(
        dev_env.variables.get("base_url"),
        Some(&"http://localhost:3000".to_string())
    );
}

/// 测试多环境切换
#[test]
fn test_multi_environment_switching() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("restflow.toml");

    let config_content = r#"
[environments.dev]
base_url = "http://localhost:3000"
db_name = "dev_db"

[environments.prod]
base_url = "https://api.example.com"
db_name = "prod_db"
"#;

    fs::write(&config_path, config_content).unwrap();
    let config = ConfigLoader::load_from_path(&config_path).unwrap();

    let state = ConfigLoader::build_state(&config, Some("dev"), &[]);
    assert_eq!(
        state.substitute("{{base_url}}/{{db_name}}"),
        "http://localhost:3000/dev_db"
    );

    let state = ConfigLoader::build_state(&config, Some("prod"), &[]);
    assert_eq!(
        state.substitute("{{base_url}}/{{db_name}}"),
        "https://api.example.com/prod_db"
    );

    // 不指定环境时，静态变量表为空
    let state = ConfigLoader::build_state(&config, None, &[]);
    assert!(state.store.is_empty());
}

/// 测试 CLI 变量覆盖优先级
#[test]
fn test_cli_override_priority() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("restflow.toml");

    fs::write(
        &config_path,
        "[environments.dev]\nbase_url = \"http://localhost:3000\"\napi_key = \"config-key\"\n",
    )
    .unwrap();

    let config = ConfigLoader::load_from_path(&config_path).unwrap();
    let cli_vars = vec![("api_key".to_string(), "cli-override-key".to_string())];
    let mut state = ConfigLoader::build_state(&config, Some("dev"), &cli_vars);

    assert_eq!(state.substitute("{{api_key}}"), "cli-override-key");

    // 文件中的静态赋值也无法覆盖 CLI 变量
    state.store.set("api_key", "file-key");
    assert_eq!(state.substitute("{{api_key}}"), "cli-override-key");
    assert_eq!(
        state.substitute("{{base_url}}"),
        "http://localhost:3000"
    );
}

/// 测试环境变量解析
#[test]
fn test_environment_variable_resolution() {
    unsafe {
        std::env::set_var("RESTFLOW_TEST_ENV_VAR", "environment-value");
    }

    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("restflow.toml");

    fs::write(
        &config_path,
        "[environments.dev]\napi_key = \"${RESTFLOW_TEST_ENV_VAR}\"\n",
    )
    .unwrap();

    let config = ConfigLoader::load_from_path(&config_path).unwrap();
    let state = ConfigLoader::build_state(&config, Some("dev"), &[]);
    assert_eq!(state.substitute("{{api_key}}"), "environment-value");

    unsafe {
        std::env::remove_var("RESTFLOW_TEST_ENV_VAR");
    }
}

/// 测试 .env 目录配置
#[test]
fn test_dotenv_directory_from_config() {
    let temp_dir = TempDir::new().unwrap();
    let env_dir = temp_dir.path().join("env");
    fs::create_dir(&env_dir).unwrap();
    fs::write(
        env_dir.join(".env"),
        "# secrets\nexport DB_PASSWORD=\"s3cret\"\n",
    )
    .unwrap();

    let config_path = temp_dir.path().join("restflow.toml");
    fs::write(
        &config_path,
        format!("[dotenv]\nbase_dir = {:?}\n", env_dir.display().to_string()),
    )
    .unwrap();

    let config = ConfigLoader::load_from_path(&config_path).unwrap();
    let state = ConfigLoader::build_state(&config, None, &[]);

    assert_eq!(state.substitute("{{$dotenv DB_PASSWORD}}"), "s3cret");
    assert_eq!(
        state.substitute("{{$dotenv NOT_THERE}}"),
        "{{$dotenv NOT_THERE}}"
    );
}

/// 测试缺失变量的处理
#[test]
fn test_missing_variable_handling() {
    let mut state = VariableState::new();
    assert_eq!(state.substitute("{{missing_var}}"), "{{missing_var}}");

    state.store.set("defined", "value");
    assert_eq!(
        state.substitute("{{defined}} and {{undefined}}"),
        "value and {{undefined}}"
    );
}

#[test]
fn test_dynamic_variables() {
    let state = VariableState::new().with_dynamic(
        DynamicVariables::new().with_clock(FixedClock(
            chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        )),
    );

    assert_eq!(state.substitute("{{$randomInt 5 5}}"), "5");
    assert_eq!(state.substitute("{{$timestamp}}"), "1700000000");
    assert_eq!(state.substitute("{{$uuid}}").len(), 36);
    assert_eq!(state.substitute("{{$unknown}}"), "{{$unknown}}");
}

/// 未记录的命名响应保持原样
#[test]
fn test_named_response_reference() {
    let mut state = VariableState::new();
    assert_eq!(
        state.substitute("{{login.response.body.token}}"),
        "{{login.response.body.token}}"
    );

    state.responses.record(
        "login",
        NamedResponseRecord::new(
            200,
            "OK",
            vec![("X-Trace".to_string(), "t-1".to_string())],
            r#"{"token": "abc", "user": {"roles": ["admin"]}}"#,
        ),
    );

    assert_eq!(state.substitute("{{login.response.body.token}}"), "abc");
    assert_eq!(
        state.substitute("{{login.response.body.$.user.roles[0]}}"),
        "admin"
    );
    assert_eq!(state.substitute("{{login.response.headers.x-trace}}"), "t-1");
    assert_eq!(state.substitute("{{login.response.status}}"), "200");
}

#[test]
fn test_empty_config() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("restflow.toml");
    fs::write(&config_path, "").unwrap();

    let config = ConfigLoader::load_from_path(&config_path).unwrap();
    assert!(config.environments.is_empty());
}

#[test]
fn test_invalid_config_is_error() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("restflow.toml");
    fs::write(&config_path, "[environments.dev\n").unwrap();

    assert!(ConfigLoader::load_from_path(&config_path).is_err());
}

/// 测试 CLI 变量解析格式
#[test]
fn test_cli_variable_parsing() {
    let (k1, v1) = ConfigLoader::parse_cli_var("key1=value1").unwrap();
    assert_eq!(k1, "key1");
    assert_eq!(v1, "value1");

    let (k2, v2) = ConfigLoader::parse_cli_var("key2=value with spaces").unwrap();
    assert_eq!(k2, "key2");
    assert_eq!(v2, "value with spaces");

    let (k3, v3) = ConfigLoader::parse_cli_var("key3=value=with=equals").unwrap();
    assert_eq!(k3, "key3");
    assert_eq!(v3, "value=with=equals");

    assert!(ConfigLoader::parse_cli_var("novalue").is_none());
}
