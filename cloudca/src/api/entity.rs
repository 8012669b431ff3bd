//! Entity operation gateway
//!
//! Every entity collection of a service environment is reached through the
//! same six operations. Responses that reference an asynchronous task are
//! resolved before returning, so results are always final.

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::client::Client;
use super::context::Context;
use super::error::ApiError;
use super::options::QueryOptions;
use super::response::{decode_data, ListPage};

/// Entity collections exposed by a service environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityType {
    Instances,
    Networks,
    Vpcs,
    NetworkAcls,
    NetworkAclRules,
    PortForwardingRules,
    LoadBalancerRules,
    PublicIpAddresses,
    SshKeys,
    RemoteAccessVpns,
    RemoteAccessVpnUsers,
    Volumes,
    Templates,
    ComputeOfferings,
    DiskOfferings,
    NetworkOfferings,
    VpcOfferings,
    Zones,
    AffinityGroups,
}

impl EntityType {
    pub fn all() -> &'static [EntityType] {
        &[
            Self::Instances,
            Self::Networks,
            Self::Vpcs,
            Self::NetworkAcls,
            Self::NetworkAclRules,
            Self::PortForwardingRules,
            Self::LoadBalancerRules,
            Self::PublicIpAddresses,
            Self::SshKeys,
            Self::RemoteAccessVpns,
            Self::RemoteAccessVpnUsers,
            Self::Volumes,
            Self::Templates,
            Self::ComputeOfferings,
            Self::DiskOfferings,
            Self::NetworkOfferings,
            Self::VpcOfferings,
            Self::Zones,
            Self::AffinityGroups,
        ]
    }

    /// Path segment used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Instances => "instances",
            Self::Networks => "networks",
            Self::Vpcs => "vpcs",
            Self::NetworkAcls => "networkacls",
            Self::NetworkAclRules => "networkaclrules",
            Self::PortForwardingRules => "portforwardingrules",
            Self::LoadBalancerRules => "loadbalancerrules",
            Self::PublicIpAddresses => "publicipaddresses",
            Self::SshKeys => "sshkeys",
            Self::RemoteAccessVpns => "remoteaccessvpn",
            Self::RemoteAccessVpnUsers => "remoteaccessvpnuser",
            Self::Volumes => "volumes",
            Self::Templates => "templates",
            Self::ComputeOfferings => "computeofferings",
            Self::DiskOfferings => "diskofferings",
            Self::NetworkOfferings => "networkofferings",
            Self::VpcOfferings => "vpcofferings",
            Self::Zones => "zones",
            Self::AffinityGroups => "affinitygroups",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ApiError::InvalidArgument(format!("unknown entity type: {}", s)))
    }
}

/// Service, environment and collection an operation targets
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityRef {
    pub service_code: String,
    pub environment_name: String,
    pub entity_type: EntityType,
}

impl EntityRef {
    pub fn new(service_code: &str, environment_name: &str, entity_type: EntityType) -> Self {
        Self {
            service_code: service_code.to_string(),
            environment_name: environment_name.to_string(),
            entity_type,
        }
    }

    /// /services/{service}/{environment}/{entityType}
    pub fn collection_path(&self) -> String {
        format!(
            "/services/{}/{}/{}",
            urlencoding::encode(&self.service_code),
            urlencoding::encode(&self.environment_name),
            self.entity_type
        )
    }

    /// /services/{service}/{environment}/{entityType}/{id}
    pub fn entity_path(&self, id: &str) -> String {
        format!("{}/{}", self.collection_path(), urlencoding::encode(id))
    }
}

/// Uniform capability set of an entity collection
#[async_trait]
pub trait EntityOperations: Send + Sync {
    fn entity_ref(&self) -> &EntityRef;

    async fn get(&self, ctx: &Context, id: &str, options: &QueryOptions) -> Result<Value, ApiError>;

    async fn list(&self, ctx: &Context, options: &QueryOptions) -> Result<Value, ApiError>;

    async fn create(
        &self,
        ctx: &Context,
        body: &Value,
        options: &QueryOptions,
    ) -> Result<Value, ApiError>;

    async fn update(
        &self,
        ctx: &Context,
        id: &str,
        body: &Value,
        options: &QueryOptions,
    ) -> Result<Value, ApiError>;

    async fn delete(
        &self,
        ctx: &Context,
        id: &str,
        body: Option<&Value>,
        options: &QueryOptions,
    ) -> Result<Value, ApiError>;

    async fn execute(
        &self,
        ctx: &Context,
        id: &str,
        operation: &str,
        body: Option<&Value>,
        options: &QueryOptions,
    ) -> Result<Value, ApiError>;
}

/// Entity API for one collection
#[derive(Clone)]
pub struct EntityApi {
    client: Client,
    entity_ref: EntityRef,
}

impl EntityApi {
    pub fn new(client: Client, entity_ref: EntityRef) -> Self {
        Self { client, entity_ref }
    }

    pub fn entity_ref(&self) -> &EntityRef {
        &self.entity_ref
    }

    /// GET /services/{service}/{environment}/{type}/{id}
    pub async fn get(
        &self,
        ctx: &Context,
        id: &str,
        options: &QueryOptions,
    ) -> Result<Value, ApiError> {
        let path = self.entity_path(id)?;
        self.call(ctx, Method::GET, &path, options, None).await
    }

    /// GET /services/{service}/{environment}/{type}
    pub async fn list(&self, ctx: &Context, options: &QueryOptions) -> Result<Value, ApiError> {
        let path = self.entity_ref.collection_path();
        self.call(ctx, Method::GET, &path, options, None).await
    }

    /// Like `list`, keeping the envelope metadata
    pub async fn list_page(
        &self,
        ctx: &Context,
        options: &QueryOptions,
    ) -> Result<ListPage, ApiError> {
        let path = self.entity_ref.collection_path();
        let mut envelope = self
            .client
            .send(ctx, Method::GET, &path, options, None)
            .await?;
        let metadata = envelope.metadata.take().unwrap_or_default();
        let data = self.client.tasks().resolve(ctx, envelope).await?;
        Ok(ListPage { data, metadata })
    }

    /// POST /services/{service}/{environment}/{type}
    pub async fn create(
        &self,
        ctx: &Context,
        body: &Value,
        options: &QueryOptions,
    ) -> Result<Value, ApiError> {
        let path = self.entity_ref.collection_path();
        self.call(ctx, Method::POST, &path, options, Some(body)).await
    }

    /// PUT /services/{service}/{environment}/{type}/{id}
    pub async fn update(
        &self,
        ctx: &Context,
        id: &str,
        body: &Value,
        options: &QueryOptions,
    ) -> Result<Value, ApiError> {
        let path = self.entity_path(id)?;
        self.call(ctx, Method::PUT, &path, options, Some(body)).await
    }

    /// DELETE /services/{service}/{environment}/{type}/{id}
    ///
    /// The optional body carries deletion flags such as purge or cascade.
    pub async fn delete(
        &self,
        ctx: &Context,
        id: &str,
        body: Option<&Value>,
        options: &QueryOptions,
    ) -> Result<Value, ApiError> {
        let path = self.entity_path(id)?;
        self.call(ctx, Method::DELETE, &path, options, body).await
    }

    /// POST /services/{service}/{environment}/{type}[/{id}]?operation={operation}
    ///
    /// Named actions (start, stop, reboot, attach, ...). An empty `id` targets
    /// the collection root.
    pub async fn execute(
        &self,
        ctx: &Context,
        id: &str,
        operation: &str,
        body: Option<&Value>,
        options: &QueryOptions,
    ) -> Result<Value, ApiError> {
        if operation.is_empty() {
            return Err(ApiError::InvalidArgument("operation name is required".into()));
        }

        let path = if id.is_empty() {
            self.entity_ref.collection_path()
        } else {
            self.entity_ref.entity_path(id)
        };
        let query = options.clone().set("operation", operation);

        tracing::debug!(
            "Executing {} on {} {}",
            operation,
            self.entity_ref.entity_type,
            if id.is_empty() { "<collection>" } else { id }
        );
        self.call(ctx, Method::POST, &path, &query, body).await
    }

    /// `get` decoded into `T`
    pub async fn get_as<T: DeserializeOwned>(
        &self,
        ctx: &Context,
        id: &str,
        options: &QueryOptions,
    ) -> Result<T, ApiError> {
        decode_data(self.get(ctx, id, options).await?)
    }

    /// `list` decoded into a vector of `T`
    pub async fn list_as<T: DeserializeOwned>(
        &self,
        ctx: &Context,
        options: &QueryOptions,
    ) -> Result<Vec<T>, ApiError> {
        match self.list(ctx, options).await? {
            Value::Null => Ok(Vec::new()),
            data => decode_data(data),
        }
    }

    fn entity_path(&self, id: &str) -> Result<String, ApiError> {
        if id.is_empty() {
            return Err(ApiError::InvalidArgument(format!(
                "{} id is required",
                self.entity_ref.entity_type
            )));
        }
        Ok(self.entity_ref.entity_path(id))
    }

    async fn call(
        &self,
        ctx: &Context,
        method: Method,
        path: &str,
        options: &QueryOptions,
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        let envelope = self.client.send(ctx, method, path, options, body).await?;
        self.client.tasks().resolve(ctx, envelope).await
    }
}

#[async_trait]
impl EntityOperations for EntityApi {
    fn entity_ref(&self) -> &EntityRef {
        &self.entity_ref
    }

    async fn get(
        &self,
        ctx: &Context,
        id: &str,
        options: &QueryOptions,
    ) -> Result<Value, ApiError> {
        EntityApi::get(self, ctx, id, options).await
    }

    async fn list(&self, ctx: &Context, options: &QueryOptions) -> Result<Value, ApiError> {
        EntityApi::list(self, ctx, options).await
    }

    async fn create(
        &self,
        ctx: &Context,
        body: &Value,
        options: &QueryOptions,
    ) -> Result<Value, ApiError> {
        EntityApi::create(self, ctx, body, options).await
    }

    async fn update(
        &self,
        ctx: &Context,
        id: &str,
        body: &Value,
        options: &QueryOptions,
    ) -> Result<Value, ApiError> {
        EntityApi::update(self, ctx, id, body, options).await
    }

    async fn delete(
        &self,
        ctx: &Context,
        id: &str,
        body: Option<&Value>,
        options: &QueryOptions,
    ) -> Result<Value, ApiError> {
        EntityApi::delete(self, ctx, id, body, options).await
    }

    async fn execute(
        &self,
        ctx: &Context,
        id: &str,
        operation: &str,
        body: Option<&Value>,
        options: &QueryOptions,
    ) -> Result<Value, ApiError> {
        EntityApi::execute(self, ctx, id, operation, body, options).await
    }
}

/// Map from entity type to the operations of that collection
#[derive(Clone)]
pub struct EntityRegistry {
    service_code: String,
    environment_name: String,
    entries: HashMap<EntityType, Arc<dyn EntityOperations>>,
}

impl EntityRegistry {
    pub fn new(service_code: &str, environment_name: &str) -> Self {
        Self {
            service_code: service_code.to_string(),
            environment_name: environment_name.to_string(),
            entries: HashMap::new(),
        }
    }

    /// Registry with an `EntityApi` for every known entity type
    pub fn with_defaults(client: &Client, service_code: &str, environment_name: &str) -> Self {
        let mut registry = Self::new(service_code, environment_name);
        for entity_type in EntityType::all() {
            let entity_ref = EntityRef::new(service_code, environment_name, *entity_type);
            registry.register(*entity_type, Arc::new(EntityApi::new(client.clone(), entity_ref)));
        }
        registry
    }

    /// Register or replace the operations for one entity type
    pub fn register(&mut self, entity_type: EntityType, ops: Arc<dyn EntityOperations>) {
        self.entries.insert(entity_type, ops);
    }

    pub fn get(&self, entity_type: EntityType) -> Option<Arc<dyn EntityOperations>> {
        self.entries.get(&entity_type).cloned()
    }

    /// Look up by wire name, e.g. "instances"
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn EntityOperations>, ApiError> {
        let entity_type = name.parse::<EntityType>()?;
        self.get(entity_type).ok_or_else(|| {
            ApiError::InvalidArgument(format!(
                "{} is not registered for {}/{}",
                entity_type, self.service_code, self.environment_name
            ))
        })
    }

    pub fn service_code(&self) -> &str {
        &self.service_code
    }

    pub fn environment_name(&self) -> &str {
        &self.environment_name
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
