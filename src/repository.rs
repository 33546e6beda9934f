//! The orchestration front-end: routes a GVK and payload through synthesis,
//! decomposition, and the writer for stores, and through the reader and
//! assembler for retrievals. Holds the only database handle and the
//! process-wide schema registry.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, RwLock};

use log::{info, warn};
use serde_json::{json, Value};

use crate::db::OrchidDb;
use crate::document::assemble::Assembler;
use crate::document::decompose::decompose;
use crate::document::{nested_string, nested_value};
use crate::error::Error;
use crate::jsonschema::{resource_definition_schema, JsonSchemaProps};
use crate::schema::Schema;
use crate::validator::Validator;

/// Group/Version/Kind: the triple identifying a resource type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupVersionKind {
    pub group: String,
    pub version: String,
    pub kind: String,
}

/// The GVK under which resource-definitions themselves are stored.
pub const DEFINITION_GROUP: &str = "apiextensions.k8s.io";
pub const DEFINITION_VERSION: &str = "v1";
pub const DEFINITION_KIND: &str = "CustomResourceDefinition";

/// `metadata.name` of the bootstrap definition describing definitions.
pub const SELF_DEFINITION_NAME: &str = "customresourcedefinitions.apiextensions.k8s.io";

impl GroupVersionKind {
    pub fn new(group: &str, version: &str, kind: &str) -> Self {
        Self {
            group: group.to_string(),
            version: version.to_string(),
            kind: kind.to_string(),
        }
    }

    /// The GVK of resource-definitions.
    pub fn definition() -> Self {
        Self::new(DEFINITION_GROUP, DEFINITION_VERSION, DEFINITION_KIND)
    }

    pub fn is_definition(&self) -> bool {
        *self == Self::definition()
    }

    /// The `apiVersion` document field: `group/version`, or bare `version`
    /// for the empty group.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    pub fn from_api_version(api_version: &str, kind: &str) -> Self {
        match api_version.split_once('/') {
            Some((group, version)) => Self::new(group, version, kind),
            None => Self::new("", api_version, kind),
        }
    }
}

impl fmt::Display for GroupVersionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, Kind={}", self.api_version(), self.kind)
    }
}

/// Stores and serves resources; one instance per process.
pub struct Repository {
    db: OrchidDb,
    schemas: RwLock<HashMap<String, Arc<Schema>>>,
    validator: Box<dyn Validator>,
}

impl Repository {
    pub fn new(db: OrchidDb, validator: Box<dyn Validator>) -> Self {
        Self {
            db,
            schemas: RwLock::new(HashMap::new()),
            validator,
        }
    }

    /// The schema (and root table) name for a GVK.
    pub fn schema_name(gvk: &GroupVersionKind) -> String {
        let mut parts = Vec::new();
        if !gvk.group.is_empty() {
            parts.push(gvk.group.replace('.', "_"));
        }
        parts.push(gvk.version.clone());
        parts.push(gvk.kind.clone());
        parts.join("_").to_lowercase()
    }

    /// Ensures the database exists, synthesizes the meta-schema that stores
    /// resource-definitions, creates its tables, and registers the
    /// self-referential definition row.
    pub async fn bootstrap(&self) -> Result<(), Error> {
        self.db.bootstrap_database().await?;

        let schema = self.definition_schema()?;
        self.db.create_schema_tables(&schema).await?;

        let existing = self.definition_documents().await?;
        let present = existing.iter().any(|d| {
            nested_string(d, &["metadata".to_string(), "name".to_string()])
                .map(|n| n == SELF_DEFINITION_NAME)
                .unwrap_or(false)
        });
        if !present {
            self.create(&self_definition()).await?;
            info!("registered the self-referential resource-definition");
        }
        Ok(())
    }

    /// Persists a document. When the document is itself a
    /// resource-definition, the schema of the kind it defines is synthesized
    /// and its tables created before the definition is stored.
    pub async fn create(&self, document: &Value) -> Result<(), Error> {
        let gvk = document_gvk(document)?;
        let schema = self.schema_for_gvk(&gvk).await?;

        let openapi = self.openapi_schema_for_gvk(&gvk).await?;
        self.validator.validate(&openapi, document).await?;

        if gvk.is_definition() {
            let target = definition_target_gvk(document)?;
            let target_openapi = definition_openapi_schema(document)?;
            info!("registering '{target}'");
            let target_schema = self.register(&target, &target_openapi)?;
            self.db.create_schema_tables(&target_schema).await?;
        }

        let matrix = decompose(&schema, document)?;
        self.db.write(&schema, &matrix).await
    }

    /// Retrieves the single resource of `gvk` stored under the namespaced
    /// name.
    pub async fn read(
        &self,
        gvk: &GroupVersionKind,
        namespace: &str,
        name: &str,
    ) -> Result<Value, Error> {
        let schema = self.schema_for_gvk(gvk).await?;
        let rs = self.db.read(&schema, namespace, name).await?;
        let mut documents = Assembler::new(&schema, &rs).build()?;
        if documents.is_empty() {
            return Err(Error::ResourceNotFound {
                gvk: gvk.to_string(),
                namespace: namespace.to_string(),
                name: name.to_string(),
            });
        }
        if documents.len() > 1 {
            warn!(
                "read of '{gvk}' '{namespace}/{name}' matched {} documents",
                documents.len()
            );
        }
        let mut document = documents.swap_remove(0);
        stamp_gvk(&mut document, gvk);
        Ok(document)
    }

    /// Lists resources of `gvk`, filtered by label equality. The empty
    /// filter lists everything; the result may be empty.
    pub async fn list(
        &self,
        gvk: &GroupVersionKind,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<Value>, Error> {
        let schema = self.schema_for_gvk(gvk).await?;
        let rs = self.db.list(&schema, labels).await?;
        let mut documents = Assembler::new(&schema, &rs).build()?;
        for document in &mut documents {
            stamp_gvk(document, gvk);
        }
        Ok(documents)
    }

    /// The OpenAPI schema registered for a GVK; definitions resolve to the
    /// built-in meta-schema.
    pub async fn openapi_schema_for_gvk(
        &self,
        gvk: &GroupVersionKind,
    ) -> Result<JsonSchemaProps, Error> {
        if gvk.is_definition() {
            return Ok(resource_definition_schema());
        }
        for definition in self.definition_documents().await? {
            if definition_target_gvk(&definition)? == *gvk {
                return definition_openapi_schema(&definition);
            }
        }
        Err(Error::DefinitionNotFound {
            gvk: gvk.to_string(),
        })
    }

    /// Resolves the schema for a GVK: registry first, then re-synthesis
    /// from the stored definition (a restarted process serves kinds
    /// registered by an earlier one).
    async fn schema_for_gvk(&self, gvk: &GroupVersionKind) -> Result<Arc<Schema>, Error> {
        if gvk.is_definition() {
            return self.definition_schema();
        }
        let name = Self::schema_name(gvk);
        if let Some(schema) = self.lookup(&name)? {
            return Ok(schema);
        }
        let openapi = self.openapi_schema_for_gvk(gvk).await?;
        self.register(gvk, &openapi)
    }

    /// All stored resource-definition documents.
    async fn definition_documents(&self) -> Result<Vec<Value>, Error> {
        let gvk = GroupVersionKind::definition();
        let schema = self.definition_schema()?;
        let rs = self.db.list(&schema, &BTreeMap::new()).await?;
        let mut documents = Assembler::new(&schema, &rs).build()?;
        for document in &mut documents {
            stamp_gvk(document, &gvk);
        }
        Ok(documents)
    }

    /// The meta-schema, synthesized once and cached like any other.
    fn definition_schema(&self) -> Result<Arc<Schema>, Error> {
        let gvk = GroupVersionKind::definition();
        let name = Self::schema_name(&gvk);
        if let Some(schema) = self.lookup(&name)? {
            return Ok(schema);
        }
        self.register(&gvk, &resource_definition_schema())
    }

    fn lookup(&self, name: &str) -> Result<Option<Arc<Schema>>, Error> {
        let registry = self
            .schemas
            .read()
            .map_err(|_| Error::internal("schema registry lock poisoned"))?;
        Ok(registry.get(name).cloned())
    }

    /// Synthesizes the schema for a GVK and publishes it in the registry.
    fn register(
        &self,
        gvk: &GroupVersionKind,
        openapi: &JsonSchemaProps,
    ) -> Result<Arc<Schema>, Error> {
        let name = Self::schema_name(gvk);
        let mut schema = Schema::new(&name);
        schema.generate(openapi)?;
        let schema = Arc::new(schema);
        let mut registry = self
            .schemas
            .write()
            .map_err(|_| Error::internal("schema registry lock poisoned"))?;
        Ok(registry.entry(name).or_insert(schema).clone())
    }
}

/// The GVK a document declares through `apiVersion` and `kind`.
pub fn document_gvk(document: &Value) -> Result<GroupVersionKind, Error> {
    let api_version = nested_string(document, &["apiVersion".to_string()])?;
    let kind = nested_string(document, &["kind".to_string()])?;
    Ok(GroupVersionKind::from_api_version(api_version, kind))
}

/// The GVK a resource-definition document registers:
/// `spec.group` + `spec.versions[0].name` + `spec.names.kind`.
pub fn definition_target_gvk(document: &Value) -> Result<GroupVersionKind, Error> {
    let group = nested_string(document, &["spec".to_string(), "group".to_string()])?;
    let kind = nested_string(
        document,
        &["spec".to_string(), "names".to_string(), "kind".to_string()],
    )?;
    let version = first_version(document)?
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::validation("spec.versions[0].name is missing"))?;
    Ok(GroupVersionKind::new(group, version, kind))
}

/// The OpenAPI schema a resource-definition document carries under
/// `spec.versions[0].schema.openAPIV3Schema`.
pub fn definition_openapi_schema(document: &Value) -> Result<JsonSchemaProps, Error> {
    let version = first_version(document)?;
    let openapi = version
        .get("schema")
        .and_then(|s| s.get("openAPIV3Schema"))
        .ok_or_else(|| Error::validation("spec.versions[0].schema.openAPIV3Schema is missing"))?;
    serde_json::from_value(openapi.clone())
        .map_err(|e| Error::validation(format!("malformed openAPIV3Schema: {e}")))
}

fn first_version(document: &Value) -> Result<&Value, Error> {
    nested_value(document, &["spec".to_string(), "versions".to_string()])
        .and_then(Value::as_array)
        .and_then(|versions| versions.first())
        .ok_or_else(|| Error::validation("spec.versions is missing or empty"))
}

/// Parses a `key=value,key=value` label selector.
pub fn parse_label_selector(selector: &str) -> Result<BTreeMap<String, String>, Error> {
    let mut labels = BTreeMap::new();
    for pair in selector.split(',').filter(|p| !p.is_empty()) {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| Error::validation(format!("malformed label selector '{pair}'")))?;
        labels.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(labels)
}

fn stamp_gvk(document: &mut Value, gvk: &GroupVersionKind) {
    if let Some(object) = document.as_object_mut() {
        object.insert("apiVersion".to_string(), json!(gvk.api_version()));
        object.insert("kind".to_string(), json!(gvk.kind));
    }
}

/// The definition that defines resource-definitions themselves; stored
/// during bootstrap so the meta-kind is discoverable like any other.
pub fn self_definition() -> Value {
    let gvk = GroupVersionKind::definition();
    json!({
        "apiVersion": gvk.api_version(),
        "kind": gvk.kind,
        "metadata": {
            "name": SELF_DEFINITION_NAME,
            "namespace": ""
        },
        "spec": {
            "group": DEFINITION_GROUP,
            "names": {
                "kind": DEFINITION_KIND,
                "listKind": "CustomResourceDefinitionList",
                "plural": "customresourcedefinitions",
                "singular": "customresourcedefinition"
            },
            "versions": [{
                "name": DEFINITION_VERSION,
                "schema": {
                    "openAPIV3Schema": serde_json::to_value(resource_definition_schema())
                        .unwrap_or(Value::Null)
                }
            }]
        }
    })
}
