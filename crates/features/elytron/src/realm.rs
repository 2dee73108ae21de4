use crate::capability_service;
use capstan_controller::{ResolveContext, ServiceDefinitionProvider};
use capstan_domain::capabilities::{SECURITY_REALM, dynamic};
use capstan_domain::{ModelValue, PathAddress, ServiceName};
use capstan_model::{AttributeDefinition, AttributeViolation, ResourceSchema, RestartPolicy};
use capstan_services::{
    ActivationError, ActivationErrorExt, Service, ServiceDefinition, ServiceValue, StartContext,
    async_trait,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Identities loaded from a users file and an optional groups file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertiesRealm {
    name: String,
    plain_text: bool,
    groups_attribute: String,
    users: BTreeMap<String, String>,
    groups: BTreeMap<String, Vec<String>>,
}

impl PropertiesRealm {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Passwords in the users file are stored in clear.
    #[must_use]
    pub const fn is_plain_text(&self) -> bool {
        self.plain_text
    }

    #[must_use]
    pub fn contains(&self, user: &str) -> bool {
        self.users.contains_key(user)
    }

    pub fn users(&self) -> impl Iterator<Item = &str> {
        self.users.keys().map(String::as_str)
    }

    #[must_use]
    pub fn groups(&self, user: &str) -> &[String] {
        self.groups.get(user).map_or(&[], Vec::as_slice)
    }

    /// Identity attributes of `user`; group membership lives under the groups attribute.
    #[must_use]
    pub fn attributes(&self, user: &str) -> BTreeMap<String, Vec<String>> {
        let mut attributes = BTreeMap::new();
        if self.contains(user) {
            attributes.insert(self.groups_attribute.clone(), self.groups(user).to_vec());
        }
        attributes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

pub(crate) fn schema() -> ResourceSchema {
    let file = |name: &str, extra: Vec<AttributeDefinition>| {
        let mut fields = vec![
            AttributeDefinition::string("path").required().length(1, 4096),
            AttributeDefinition::string("relative-to"),
        ];
        fields.extend(extra);
        AttributeDefinition::object(name, fields).restart(RestartPolicy::ResourceServices)
    };
    ResourceSchema::new()
        .attribute(
            file("users-properties", vec![AttributeDefinition::boolean("plain-text").default_value(false)])
                .required(),
        )
        .attribute(file("groups-properties", Vec::new()))
        .attribute(
            AttributeDefinition::string("groups-attribute")
                .default_value("groups")
                .restart(RestartPolicy::ResourceServices),
        )
}

fn file_path(value: &ModelValue) -> Option<PathBuf> {
    let path = PathBuf::from(value.get("path")?.as_str()?);
    Some(match value.get("relative-to").and_then(ModelValue::as_str) {
        Some(base) => Path::new(base).join(path),
        None => path,
    })
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct PropertiesRealmProvider;

impl ServiceDefinitionProvider for PropertiesRealmProvider {
    fn service_name(&self, address: &PathAddress) -> ServiceName {
        capability_service(SECURITY_REALM, address)
    }

    fn definition(&self, ctx: &ResolveContext<'_>) -> Result<ServiceDefinition, AttributeViolation> {
        let users = ctx.value("users-properties");
        let groups = ctx.value("groups-properties");
        let service = RealmService {
            name: ctx.name().to_owned(),
            users: file_path(&users)
                .ok_or_else(|| AttributeViolation::new("users-properties.path", "path is required"))?,
            groups: file_path(&groups),
            plain_text: users.get("plain-text").and_then(ModelValue::as_bool).unwrap_or(false),
            groups_attribute: ctx.string("groups-attribute")?,
        };
        Ok(ServiceDefinition::new(self.service_name(ctx.address()), service)
            .provides(dynamic(SECURITY_REALM, ctx.name())))
    }
}

struct RealmService {
    name: String,
    users: PathBuf,
    groups: Option<PathBuf>,
    plain_text: bool,
    groups_attribute: String,
}

#[async_trait]
impl Service for RealmService {
    async fn start(&self, _ctx: &StartContext) -> Result<ServiceValue, ActivationError> {
        let users = load(&self.users).await?;
        let groups = match &self.groups {
            Some(path) => load(path)
                .await?
                .into_iter()
                .map(|(user, groups)| {
                    let groups = groups
                        .split(',')
                        .map(str::trim)
                        .filter(|g| !g.is_empty())
                        .map(str::to_owned)
                        .collect();
                    (user, groups)
                })
                .collect(),
            None => BTreeMap::new(),
        };
        info!(realm = %self.name, users = users.len(), "Properties realm loaded");
        Ok(Arc::new(PropertiesRealm {
            name: self.name.clone(),
            plain_text: self.plain_text,
            groups_attribute: self.groups_attribute.clone(),
            users,
            groups,
        }))
    }
}

async fn load(path: &Path) -> Result<BTreeMap<String, String>, ActivationError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ActivationError::start(e.to_string()))
        .context(format!("reading {}", path.display()))?;
    Ok(parse_properties(&text))
}

/// `key=value` lines; `#` and `!` start comments.
pub(crate) fn parse_properties(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_owned(), value.trim().to_owned()))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}
