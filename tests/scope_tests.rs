//! Scope isolation, cross-scope lookups and emission

use std::fs;
use std::sync::Arc;

use infra_synth::{
    AttributeSchema, Backend, Checksum, Export, ExportManifest, Field, Namespace, OutputConfig, OutputFormat,
    ProviderBinding, ReferencePolicy, ResourceType, SynthConfig, SynthError, Template, Value,
};
use serde_json::json;
use tempfile::tempdir;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn vpc() -> Arc<ResourceType> {
    Arc::new(
        ResourceType::resource(
            "aws_vpc",
            AttributeSchema::builder()
                .field(Field::string("cidr_block").required())
                .field(Field::map_of_strings("tags").accumulate())
                .build(),
        )
        .outputs(["id", "arn"]),
    )
}

fn subnet() -> Arc<ResourceType> {
    Arc::new(
        ResourceType::resource(
            "aws_subnet",
            AttributeSchema::builder()
                .field(Field::string("vpc_id").required())
                .field(Field::string("cidr_block").required())
                .field(Field::string("availability_zone"))
                .build(),
        )
        .outputs(["id", "arn"]),
    )
}

fn availability_zones() -> Arc<ResourceType> {
    Arc::new(
        ResourceType::data_source(
            "aws_availability_zones",
            AttributeSchema::builder()
                .field(Field::enumeration("state", ["available", "unavailable"]).default("available"))
                .build(),
        )
        .outputs(["names", "zone_ids"]),
    )
}

fn aws(region: &str) -> ProviderBinding {
    ProviderBinding::new("aws").config("region", region)
}

#[test]
fn test_scope_isolation() {
    let mut a = Template::open("a", vec![aws("us-east-1")]).unwrap();
    let mut b = Template::open("b", vec![aws("us-east-1")]).unwrap();

    a.declare(&vpc(), "main", json!({"cidr_block": "10.0.0.0/16"})).unwrap();
    // Same (type, name) in another scope is not a duplicate
    b.declare(&vpc(), "main", json!({"cidr_block": "10.1.0.0/16"})).unwrap();

    // Nor is it visible for minting
    assert!(matches!(
        b.mint("aws_vpc", "other", "id"),
        Err(SynthError::UnknownReferenceTarget { .. })
    ));
    assert!(a.mint("aws_vpc", "main", "id").is_ok());

    let doc_a = a.close();
    let doc_b = b.close();
    assert_eq!(doc_a.scope(), "a");
    assert_eq!(doc_b.scope(), "b");
    assert_eq!(doc_a.resource("aws_vpc", "main").unwrap()["cidr_block"], json!("10.0.0.0/16"));
    assert_eq!(doc_b.resource("aws_vpc", "main").unwrap()["cidr_block"], json!("10.1.0.0/16"));
}

#[test]
fn test_live_reference_does_not_cross_scopes() {
    let mut network = Template::open("network", vec![aws("us-east-1")]).unwrap();
    let main = network.declare(&vpc(), "main", json!({"cidr_block": "10.0.0.0/16"})).unwrap();

    let mut app = Template::open("app", vec![aws("us-east-1")]).unwrap();
    let err = app
        .declare(
            &subnet(),
            "a",
            Value::map()
                .with("vpc_id", main.id().unwrap())
                .with("cidr_block", "10.0.1.0/24"),
        )
        .unwrap_err();
    assert!(matches!(err, SynthError::UnknownReferenceTarget { ref scope, .. } if scope == "app"));
    assert!(app.export("leaked", main.id().unwrap()).is_err());
}

#[test]
fn test_remote_lookup_between_scopes() {
    init_tracing();
    let ns = Namespace::new("production", Backend::s3("acme-state", "us-east-1")).unwrap();

    let mut network = ns.open("network", vec![aws("us-east-1")]).unwrap();
    let main = network.declare(&vpc(), "main", json!({"cidr_block": "10.0.0.0/16"})).unwrap();
    network
        .export_output("vpc_id", Export::new(main.id().unwrap()).description("Shared VPC"))
        .unwrap();
    let manifest = network.manifest();
    assert_eq!(manifest.outputs(), ["vpc_id".to_string()]);

    let mut app = ns.open("app", vec![aws("us-east-1")]).unwrap();
    let vpc_id = app.remote(&manifest, "vpc_id").unwrap();
    // A second lookup reuses the same remote-state block
    let again = app.remote(&manifest, "vpc_id").unwrap();
    assert_eq!(vpc_id, again);

    app.declare(
        &subnet(),
        "a",
        Value::map().with("vpc_id", &vpc_id).with("cidr_block", "10.0.1.0/24"),
    )
    .unwrap();

    let err = app.remote(&manifest, "private_subnet_ids").unwrap_err();
    match err {
        SynthError::UnsupportedDestination { scope, output } => {
            assert_eq!(scope, "network");
            assert_eq!(output, "private_subnet_ids");
        }
        other => panic!("Expected UnsupportedDestination, got {:?}", other),
    }

    let doc = app.close();
    assert_eq!(
        doc.data_source("terraform_remote_state", "network"),
        Some(&json!({
            "backend": "s3",
            "config": {
                "bucket": "acme-state",
                "region": "us-east-1",
                "key": "production/network/terraform.tfstate"
            }
        }))
    );
    assert_eq!(
        doc.resource("aws_subnet", "a").unwrap()["vpc_id"],
        json!("${data.terraform_remote_state.network.outputs.vpc_id}")
    );
    assert_eq!(
        doc.setting("backend"),
        Some(&json!({"s3": {
            "bucket": "acme-state",
            "region": "us-east-1",
            "key": "production/app/terraform.tfstate"
        }}))
    );
}

#[test]
fn test_remote_lookup_without_backend() {
    let manifest = ExportManifest::new("shared").output("zone_id");
    let mut t = Template::open("dns", vec![]).unwrap();
    let zone = t.remote(&manifest, "zone_id").unwrap();
    assert_eq!(zone.address(), "data.terraform_remote_state.shared");

    let doc = t.close();
    assert_eq!(
        doc.data_source("terraform_remote_state", "shared"),
        Some(&json!({"backend": "local", "config": {"path": "../shared/terraform.tfstate"}}))
    );
}

#[test]
fn test_data_source_declaration() {
    let mut t = Template::open("network", vec![aws("us-east-1")]).unwrap();
    let azs = t.declare(&availability_zones(), "available", json!({})).unwrap();
    assert_eq!(azs.address(), "data.aws_availability_zones.available");

    let names = t.mint_data("aws_availability_zones", "available", "names").unwrap();
    assert_eq!(names.render(), "${data.aws_availability_zones.available.names}");

    t.declare(&vpc(), "main", json!({"cidr_block": "10.0.0.0/16"})).unwrap();
    let doc = t.close();
    let sections: Vec<_> = doc.to_json().as_object().unwrap().keys().cloned().collect();
    assert_eq!(sections, vec!["provider", "data", "resource"]);
    assert_eq!(
        doc.data_source("aws_availability_zones", "available"),
        Some(&json!({"state": "available"}))
    );
}

#[test]
fn test_multi_region_providers() {
    let mut t = Template::open(
        "global",
        vec![
            aws("us-east-1"),
            ProviderBinding::new("aws").alias("eu").config("region", "eu-west-1"),
        ],
    )
    .unwrap();
    t.declare(&vpc(), "us", json!({"cidr_block": "10.0.0.0/16"})).unwrap();
    t.declare_with_provider(&vpc(), "eu", "eu", json!({"cidr_block": "10.1.0.0/16"}))
        .unwrap();

    let doc = t.close();
    assert!(doc.resource("aws_vpc", "us").unwrap().get("provider").is_none());
    assert_eq!(doc.resource("aws_vpc", "eu").unwrap()["provider"], json!("aws.eu"));
    assert_eq!(
        doc.providers("aws"),
        &[json!({"region": "us-east-1"}), json!({"region": "eu-west-1", "alias": "eu"})]
    );

    assert!(matches!(
        Template::open("bad", vec![aws("us-east-1"), aws("us-west-2")]),
        Err(SynthError::InvalidProviderBinding(_))
    ));
}

#[test]
fn test_write_one_file_per_scope() {
    init_tracing();
    let dir = tempdir().unwrap();
    let output = OutputConfig::default();

    let mut network = Template::open("network", vec![aws("us-east-1")]).unwrap();
    network.declare(&vpc(), "main", json!({"cidr_block": "10.0.0.0/16"})).unwrap();
    let mut app = Template::open("app", vec![aws("us-east-1")]).unwrap();
    app.declare(&vpc(), "sandbox", json!({"cidr_block": "10.9.0.0/16"})).unwrap();

    let network_path = network.close().write(dir.path(), &output).unwrap();
    let app_path = app.close().write(dir.path(), &output).unwrap();
    assert_ne!(network_path, app_path);

    let content = fs::read_to_string(&network_path).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(parsed, network.close().to_json());
    assert!(!content.contains("sandbox"));

    let sidecar = fs::read_to_string(network_path.with_file_name("main.tf.json.sha256")).unwrap();
    let recorded = sidecar.split_whitespace().next().unwrap().to_string();
    assert!(Checksum::from(recorded).verify(content.as_bytes()));
}

#[test]
fn test_configured_template() {
    init_tracing();
    let dir = tempdir().unwrap();
    let path = dir.path().join("synth.toml");
    fs::write(
        &path,
        r#"
[output]
format = "compact"
file_name = "config.tf.json"
include_checksum = false

[references]
policy = "permissive"

[tags]
ManagedBy = "infra-synth"
"#,
    )
    .unwrap();
    let config = SynthConfig::load_from(path.to_str()).unwrap();
    assert_eq!(config.output.format, OutputFormat::Compact);

    let mut t = Template::open("network", vec![aws("us-east-1")]).unwrap().configure(&config);
    assert_eq!(t.reference_policy(), ReferencePolicy::Permissive);
    t.declare(&vpc(), "main", json!({"cidr_block": "10.0.0.0/16"})).unwrap();
    assert!(t.mint("aws_vpc", "main", "main_route_table_id").is_ok());

    let doc = t.close();
    assert_eq!(doc.resource("aws_vpc", "main").unwrap()["tags"], json!({"ManagedBy": "infra-synth"}));

    let written = doc.write(dir.path().join("out"), &config.output).unwrap();
    assert!(written.ends_with("network/config.tf.json"));
    assert!(!written.with_file_name("config.tf.json.sha256").exists());
}
