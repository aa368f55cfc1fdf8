mod env_overrides;
pub mod log;
pub mod sources;

use std::convert::Infallible;
use std::path::{Path, PathBuf};

use config::{Config, File, FileFormat, FileSourceFile};
use envconfig::Envconfig;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    env_overrides::{EnvVarOverrides, EnvVarOverridesError},
    log::LoggingConfig,
    sources::SourceConfig,
};

#[derive(Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct BraidConfig {
    #[serde(skip)]
    root_directory: PathBuf,

    /// The logger configuration.
    #[serde(default)]
    pub log: LoggingConfig,

    /// Options of the per-request data loaders.
    #[serde(default)]
    pub dataloader: DataLoaderConfig,

    /// The schemas braided together, in registration order.
    ///
    /// When two sources expose the same query or mutation field, the later one wins.
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct DataLoaderConfig {
    /// Reports load and batch counts per batch key under `extensions.dataloader`.
    ///
    /// Can also be set via the `BRAID_INCLUDE_STATISTICS` environment variable.
    #[serde(default)]
    pub include_statistics: bool,
}

impl BraidConfig {
    /// The directory relative paths of the configuration are resolved against.
    pub fn root_directory(&self) -> &Path {
        &self.root_directory
    }

    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        self.root_directory.join(path)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BraidConfigError {
    #[error("Failed to load configuration: {0}")]
    ConfigLoadError(#[from] config::ConfigError),
    #[error("Failed to apply configuration overrides: {0}")]
    EnvVarOverridesError(#[from] EnvVarOverridesError),
    #[error("Failed to load the environment variables: {0}")]
    EnvVarLoadError(#[from] envconfig::Error),
    #[error("Failed to get the current directory: {0}")]
    CurrentDirError(std::io::Error),
    #[error("Failed to parse the configuration file path: {0}")]
    ConfigPathParseError(Infallible),
}

static DEFAULT_FILE_NAMES: &[&str] = &[
    "braid.config.yaml",
    "braid.config.yml",
    "braid.config.json",
];

fn get_current_dir() -> Result<PathBuf, BraidConfigError> {
    std::env::current_dir().map_err(BraidConfigError::CurrentDirError)
}

pub fn load_config(override_config_path: Option<String>) -> Result<BraidConfig, BraidConfigError> {
    let env_overrides = EnvVarOverrides::init_from_env()?;
    let mut config = Config::builder();
    let mut config_root_path = get_current_dir()?;

    if let Some(path_str) = override_config_path {
        let path_buf = path_str
            .parse::<PathBuf>()
            .map_err(BraidConfigError::ConfigPathParseError)?;
        if let Some(parent_dir) = path_buf.parent() {
            config_root_path = config_root_path.join(parent_dir);
        }
        let as_file: File<FileSourceFile, _> = path_buf.into();
        config = config.add_source(as_file.required(true));
    } else {
        for name in DEFAULT_FILE_NAMES {
            config = config.add_source(File::with_name(name).required(false));
        }
    }

    config = env_overrides.apply_overrides(config)?;

    let mut base_cfg = config.build()?.try_deserialize::<BraidConfig>()?;
    base_cfg.root_directory = config_root_path;

    Ok(base_cfg)
}

pub fn parse_yaml_config(config_raw: String) -> Result<BraidConfig, BraidConfigError> {
    let mut base_cfg = Config::builder()
        .add_source(File::from_str(&config_raw, FileFormat::Yaml))
        .build()?
        .try_deserialize::<BraidConfig>()?;
    base_cfg.root_directory = get_current_dir()?;

    Ok(base_cfg)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use serde_json::json;

    use crate::log::{LogFormat, LogLevel, LogOutput};
    use crate::parse_yaml_config;
    use crate::sources::{
        ExpressionsConfig, FieldOperationConfig, MapperOperationConfig, SchemaConfig, SourceConfig,
        TypeMapperConfig,
    };

    #[test]
    fn empty_config_uses_defaults() {
        let config = parse_yaml_config("{}".to_string()).unwrap();

        assert_eq!(config.log.level, LogLevel::Info);
        assert_eq!(config.log.format, LogFormat::PrettyTree);
        assert_eq!(config.log.output, LogOutput::Stderr);
        assert!(!config.dataloader.include_statistics);
        assert!(config.sources.is_empty());
    }

    #[test]
    fn parses_graphql_and_rest_sources() {
        let raw = r#"
log:
  level: debug
  format: json
  output: stdout
dataloader:
  include_statistics: true
sources:
  - type: graphql
    namespace: foo
    schema:
      file: ./foo.graphql
    endpoint: http://localhost:4001/graphql
    headers:
      authorization: Bearer secret
    top_level_fields: [foo]
    links:
      - source_type: Foo
        source_field: bar
        from_field: barId
        target_namespace: bar
        target_type: Bar
        target_field: topbar
        nullable: true
    document_mapper:
      - type: Foo
        operations:
          - op: copy
            key: label
            target: name
          - op: put
            key: kind
            value: foo
  - type: rest
    namespace: users
    schema:
      sdl: "type Query { user(id: ID): User } type User { id: ID name: String }"
    expressions: path
    root_fields:
      - field: user
        uri: http://localhost:8080/users/{id}
        mapper:
          - op: copy
            key: id
          - op: copy
            key: profile.full_name
            target: name
            default: anonymous
          - op: put
            key: kind
            value: user
"#;
        let config = parse_yaml_config(raw.to_string()).unwrap();

        assert_eq!(config.log.level, LogLevel::Debug);
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.log.output, LogOutput::Stdout);
        assert!(config.dataloader.include_statistics);
        assert_eq!(config.sources.len(), 2);

        let SourceConfig::Graphql(foo) = &config.sources[0] else {
            panic!("expected a graphql source");
        };
        assert_eq!(foo.namespace, "foo");
        assert!(matches!(&foo.schema, SchemaConfig::File(path) if path == &PathBuf::from("./foo.graphql")));
        assert_eq!(foo.endpoint.as_str(), "http://localhost:4001/graphql");
        assert_eq!(foo.headers.get("authorization").map(String::as_str), Some("Bearer secret"));
        assert_eq!(foo.top_level_fields, Some(vec!["foo".to_string()]));
        let link = &foo.links[0];
        assert_eq!(link.from_field.as_deref(), Some("barId"));
        assert_eq!(link.target_field.as_deref(), Some("topbar"));
        assert_eq!(link.argument, None);
        assert!(link.nullable);
        assert!(!link.replace_from_field);
        assert_eq!(
            foo.document_mapper,
            vec![TypeMapperConfig {
                type_name: "Foo".to_string(),
                operations: vec![
                    FieldOperationConfig::Copy {
                        key: "label".to_string(),
                        target: "name".to_string(),
                    },
                    FieldOperationConfig::Put {
                        key: "kind".to_string(),
                        value: json!("foo"),
                    },
                ],
            }]
        );

        let SourceConfig::Rest(users) = &config.sources[1] else {
            panic!("expected a rest source");
        };
        assert_eq!(config.sources[1].namespace(), "users");
        assert!(matches!(&users.schema, SchemaConfig::Sdl(sdl) if sdl.starts_with("type Query")));
        assert_eq!(users.expressions, ExpressionsConfig::Path);
        let root_field = &users.root_fields[0];
        assert_eq!(root_field.uri, "http://localhost:8080/users/{id}");
        assert_eq!(
            root_field.mapper,
            vec![
                MapperOperationConfig::Copy {
                    key: "id".to_string(),
                    target: None,
                    default: None,
                },
                MapperOperationConfig::Copy {
                    key: "profile.full_name".to_string(),
                    target: Some("name".to_string()),
                    default: Some(json!("anonymous")),
                },
                MapperOperationConfig::Put {
                    key: "kind".to_string(),
                    value: json!("user"),
                },
            ]
        );
    }

    #[test]
    fn parses_nested_mappers() {
        let raw = r#"
sources:
  - type: rest
    namespace: orders
    schema:
      sdl: "type Query { order(id: ID): Order } type Order { id: ID items: [Item] } type Item { sku: String }"
    root_fields:
      - field: order
        uri: http://localhost/orders/{id}
        mapper:
          - op: copy_list
            key: lines
            target: items
            mapper:
              - op: copy
                key: sku
          - op: map
            key: meta
            if_contains: created
            mapper:
              - op: copy
                key: created
"#;
        let config = parse_yaml_config(raw.to_string()).unwrap();
        let SourceConfig::Rest(orders) = &config.sources[0] else {
            panic!("expected a rest source");
        };
        assert_eq!(orders.expressions, ExpressionsConfig::Simple);

        let mapper = &orders.root_fields[0].mapper;
        assert!(matches!(
            &mapper[0],
            MapperOperationConfig::CopyList { key, target: Some(target), mapper }
                if key == "lines" && target == "items" && mapper.len() == 1
        ));
        assert!(matches!(
            &mapper[1],
            MapperOperationConfig::Map { key, if_contains: Some(required), .. }
                if key == "meta" && required == "created"
        ));
    }

    #[test]
    fn rejects_unknown_fields() {
        let error = parse_yaml_config("unknown: true".to_string()).unwrap_err();
        assert!(error.to_string().contains("unknown field"));
    }

    #[test]
    fn json_schema_describes_sources() {
        let schema = serde_json::to_value(schemars::schema_for!(crate::BraidConfig)).unwrap();
        let properties = schema["properties"].as_object().unwrap();
        assert!(properties.contains_key("sources"));
        assert!(properties.contains_key("dataloader"));
        assert!(properties.contains_key("log"));
    }
}
