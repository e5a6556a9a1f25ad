// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Request definitions as authored in a tab

use std::fmt;

use serde::{Deserialize, Serialize};

use super::collection::Collection;
use super::context::ScriptBody;

fn enabled_by_default() -> bool {
    true
}

/// Identifier of a request tab; one run per tab at a time
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(String);

impl TabId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TabId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Name/value pair with an enabled toggle (headers, query and path params)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub name: String,
    pub value: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

impl KeyValue {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Request body as stored with the definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum RequestBody {
    #[default]
    None,
    Raw {
        #[serde(rename = "mimeType")]
        mime_type: String,
        text: String,
    },
    FormUrlEncoded {
        params: Vec<KeyValue>,
    },
    Graphql {
        query: String,
        #[serde(default)]
        variables: Option<String>,
    },
}

impl RequestBody {
    /// Flatten to the `none | raw` shape scripts see
    pub fn to_script_body(&self) -> ScriptBody {
        match self {
            RequestBody::None => ScriptBody::None,
            RequestBody::Raw { mime_type, text } => ScriptBody::Raw {
                content_type: mime_type.clone(),
                text: text.clone(),
            },
            RequestBody::FormUrlEncoded { params } => {
                let mut form = url::form_urlencoded::Serializer::new(String::new());
                for param in params.iter().filter(|p| p.enabled) {
                    form.append_pair(&param.name, &param.value);
                }
                ScriptBody::Raw {
                    content_type: "application/x-www-form-urlencoded".to_string(),
                    text: form.finish(),
                }
            }
            RequestBody::Graphql { query, variables } => {
                let variables = variables
                    .as_deref()
                    .filter(|v| !v.trim().is_empty())
                    .and_then(|v| serde_json::from_str::<serde_json::Value>(v).ok())
                    .unwrap_or_else(|| serde_json::json!({}));
                ScriptBody::Raw {
                    content_type: "application/json".to_string(),
                    text: serde_json::json!({ "query": query, "variables": variables }).to_string(),
                }
            }
        }
    }
}

/// Authentication configured on a request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Auth {
    #[default]
    None,
    Bearer {
        token: String,
        #[serde(default)]
        prefix: Option<String>,
        #[serde(default)]
        disabled: bool,
    },
    Basic {
        username: String,
        password: String,
        #[serde(default)]
        disabled: bool,
    },
    OAuth2 {
        #[serde(default, rename = "accessToken")]
        access_token: Option<String>,
        #[serde(default)]
        disabled: bool,
    },
}

impl Auth {
    /// Apply `f` to every user-authored string (used for variable resolution)
    pub fn map_values(&self, f: impl Fn(&str) -> String) -> Auth {
        match self {
            Auth::None => Auth::None,
            Auth::Bearer {
                token,
                prefix,
                disabled,
            } => Auth::Bearer {
                token: f(token),
                prefix: prefix.as_deref().map(&f),
                disabled: *disabled,
            },
            Auth::Basic {
                username,
                password,
                disabled,
            } => Auth::Basic {
                username: f(username),
                password: f(password),
                disabled: *disabled,
            },
            Auth::OAuth2 {
                access_token,
                disabled,
            } => Auth::OAuth2 {
                access_token: access_token.as_deref().map(&f),
                disabled: *disabled,
            },
        }
    }

    /// Value of the `Authorization` header, if this auth produces one
    pub fn header_value(&self) -> Option<String> {
        match self {
            Auth::None => None,
            Auth::Bearer {
                token,
                prefix,
                disabled: false,
            } => {
                let prefix = prefix.as_deref().filter(|p| !p.is_empty()).unwrap_or("Bearer");
                Some(format!("{} {}", prefix, token))
            }
            Auth::Basic {
                username,
                password,
                disabled: false,
            } => {
                let encoded = base64::Engine::encode(
                    &base64::engine::general_purpose::STANDARD,
                    format!("{}:{}", username, password),
                );
                Some(format!("Basic {}", encoded))
            }
            Auth::OAuth2 {
                access_token: Some(token),
                disabled: false,
            } if !token.is_empty() => Some(format!("Bearer {}", token)),
            _ => None,
        }
    }
}

/// A request as defined by the user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestDefinition {
    pub id: String,
    pub name: String,
    pub method: String,
    pub url: String,
    pub headers: Vec<KeyValue>,
    pub query_params: Vec<KeyValue>,
    pub path_params: Vec<KeyValue>,
    pub body: RequestBody,
    pub auth: Auth,
    pub pre_script: Option<String>,
    pub post_script: Option<String>,
}

impl RequestDefinition {
    /// Create a definition with method and URL
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            ..Self::default()
        }
    }

    /// Add a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(KeyValue::new(name, value));
        self
    }

    /// Add a query parameter
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.push(KeyValue::new(name, value));
        self
    }

    /// Add a path parameter
    pub fn path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.push(KeyValue::new(name, value));
        self
    }

    /// Set the body
    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// Set the auth
    pub fn auth(mut self, auth: Auth) -> Self {
        self.auth = auth;
        self
    }

    /// Set the pre-script
    pub fn pre_script(mut self, script: impl Into<String>) -> Self {
        self.pre_script = Some(script.into());
        self
    }

    /// Set the post-script
    pub fn post_script(mut self, script: impl Into<String>) -> Self {
        self.post_script = Some(script.into());
        self
    }
}

/// A request tab: the unit a run is scoped to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tab {
    pub id: TabId,
    pub request: RequestDefinition,
    #[serde(default)]
    pub collection: Option<Collection>,
}

impl Tab {
    pub fn new(id: impl Into<String>, request: RequestDefinition) -> Self {
        Self {
            id: TabId::new(id),
            request,
            collection: None,
        }
    }

    pub fn with_collection(mut self, collection: Collection) -> Self {
        self.collection = Some(collection);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_header_values() {
        let bearer = Auth::Bearer {
            token: "abc".into(),
            prefix: None,
            disabled: false,
        };
        assert_eq!(bearer.header_value().as_deref(), Some("Bearer abc"));

        let basic = Auth::Basic {
            username: "user".into(),
            password: "pass".into(),
            disabled: false,
        };
        assert_eq!(basic.header_value().as_deref(), Some("Basic dXNlcjpwYXNz"));

        let oauth = Auth::OAuth2 {
            access_token: Some("tok".into()),
            disabled: false,
        };
        assert_eq!(oauth.header_value().as_deref(), Some("Bearer tok"));

        let empty_oauth = Auth::OAuth2 {
            access_token: None,
            disabled: false,
        };
        assert!(empty_oauth.header_value().is_none());

        let disabled = Auth::Bearer {
            token: "abc".into(),
            prefix: None,
            disabled: true,
        };
        assert!(disabled.header_value().is_none());
    }

    #[test]
    fn test_form_body_flattening() {
        let body = RequestBody::FormUrlEncoded {
            params: vec![
                KeyValue::new("q", "a b"),
                KeyValue::new("skip", "x").disabled(),
                KeyValue::new("n", "1"),
            ],
        };
        assert_eq!(
            body.to_script_body(),
            ScriptBody::Raw {
                content_type: "application/x-www-form-urlencoded".into(),
                text: "q=a+b&n=1".into(),
            }
        );
    }

    #[test]
    fn test_definition_from_json() {
        let json = r#"{
            "method": "POST",
            "url": "https://api.example.com/users/{id}",
            "headers": [{"name": "X-A", "value": "1"}, {"name": "X-B", "value": "2", "enabled": false}],
            "pathParams": [{"name": "id", "value": "42"}],
            "body": {"mode": "raw", "mimeType": "application/json", "text": "{}"},
            "auth": {"type": "bearer", "token": "{{token}}"}
        }"#;
        let def: RequestDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(def.method, "POST");
        assert!(def.headers[0].enabled);
        assert!(!def.headers[1].enabled);
        assert_eq!(def.path_params[0].value, "42");
        assert!(matches!(def.auth, Auth::Bearer { .. }));
        assert!(def.pre_script.is_none());
    }
}
