//! Infra Synth
//!
//! Typed infrastructure declarations compiled into configuration documents
//! for an external provisioning engine. This crate never talks to a cloud
//! API and never touches provisioning state; its job ends at a correct,
//! fully cross-referenced document.
//!
//! ## Features
//!
//! - **Closed Schemas**: every resource type validates its attributes against
//!   a typed [`AttributeSchema`] with nested blocks, tagged unions and
//!   cross-field invariants
//! - **Symbolic References**: outputs that only exist after apply are minted
//!   as [`Reference`]s and rendered as `${type.name.field}` placeholders
//! - **Isolated Scopes**: each [`Template`] is applied independently; other
//!   scopes are read through exported remote state only
//! - **Stable Output**: declaration order is document order, and every
//!   [`Document`] carries a SHA256 [`Checksum`]
//!
//! ## Flow
//!
//! ```text
//! declare(type, name, attrs)
//!     │
//!     ├─► validate ──────────► NormalizedAttributes   (or SchemaViolation /
//!     │                                                CrossFieldViolation)
//!     ├─► register node ─────► Template               (or DuplicateDeclaration)
//!     │
//!     └─► ResourceRef ───────► minted output References
//!
//! close()
//!     │
//!     └─► Synthesizer ───────► Document { terraform, provider, data, resource, output }
//! ```
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use infra_synth::{formats, AttributeSchema, Field, ProviderBinding, ResourceType, Template};
//! use serde_json::json;
//!
//! let vpc = Arc::new(
//!     ResourceType::resource(
//!         "aws_vpc",
//!         AttributeSchema::builder()
//!             .field(Field::string("cidr_block").required().pattern(formats::ipv4_cidr()))
//!             .build(),
//!     )
//!     .outputs(["id", "arn"]),
//! );
//!
//! let mut network = Template::open("network", vec![ProviderBinding::new("aws").config("region", "us-east-1")])?;
//! let main = network.declare(&vpc, "main", json!({"cidr_block": "10.0.0.0/16"}))?;
//! assert_eq!(main.id().unwrap().render(), "${aws_vpc.main.id}");
//!
//! let doc = network.close();
//! assert_eq!(doc.resource_types().collect::<Vec<_>>(), vec!["aws_vpc"]);
//! # Ok::<(), infra_synth::SynthError>(())
//! ```

pub mod checksum;
pub mod config;
pub mod document;
pub mod error;
pub mod facade;
pub mod formats;
pub mod namespace;
pub mod provider;
pub mod reference;
pub mod resource;
pub mod schema;
pub mod synth;
pub mod template;
pub mod validate;
pub mod value;
pub mod version;

pub use checksum::Checksum;
pub use config::{OutputConfig, OutputFormat, SynthConfig};
pub use document::Document;
pub use error::{Result, SynthError, ValidationError, Violation};
pub use facade::ResourceRef;
pub use namespace::{Backend, Namespace};
pub use provider::ProviderBinding;
pub use reference::{BlockKind, Reference};
pub use resource::{ResourceNode, ResourceType};
pub use schema::{AttributeSchema, Field, Invariant, TypeSpec, Variant};
pub use template::{Export, ExportManifest, ReferencePolicy, Template};
pub use validate::{validate, FieldPath, NormalizedAttributes};
pub use value::{AttributeMap, Value};
pub use version::VersionConstraint;
