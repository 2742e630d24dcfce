//! JSON Schema fragments shared between message schemas.
//!
//! Fragments are [`ObjectSchema`] builders. Message schemas combine them with
//! [`ObjectSchema::merge`], later members replacing earlier ones of the same
//! name, and render the result with [`ObjectSchema::into_schema`].

use serde_json::{json, Map, Value};

use crate::jose::ALLOWED_ALGORITHM_NAMES;

pub(crate) const PERMISSION_TYPES: &[&str] = &["READ", "WRITE"];
const LAWFUL_BASES: &[&str] = &["CONSENT"];
const KEY_USES: &[&str] = &["sig", "enc"];

/// Hyphenated RFC 4122 version-4 UUID.
const UUID_V4_PATTERN: &str =
    "^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-4[0-9a-fA-F]{3}-[89abAB][0-9a-fA-F]{3}-[0-9a-fA-F]{12}$";

/// Compact JWS: three base64url segments, signature non-empty.
const COMPACT_JWS_PATTERN: &str = r"^[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+$";

#[derive(Debug, Clone)]
struct Member {
    name: &'static str,
    schema: Value,
    required: bool,
}

/// Object schema under construction. Undeclared members are rejected unless
/// the object is [`open`](Self::open).
#[derive(Debug, Clone, Default)]
pub(crate) struct ObjectSchema {
    members: Vec<Member>,
    rules: Vec<Value>,
    open: bool,
}

impl ObjectSchema {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn required(self, name: &'static str, schema: impl Into<Value>) -> Self {
        self.member(name, schema.into(), true)
    }

    pub(crate) fn optional(self, name: &'static str, schema: impl Into<Value>) -> Self {
        self.member(name, schema.into(), false)
    }

    fn member(mut self, name: &'static str, schema: Value, required: bool) -> Self {
        let member = Member {
            name,
            schema,
            required,
        };
        match self.members.iter_mut().find(|m| m.name == name) {
            Some(existing) => *existing = member,
            None => self.members.push(member),
        }
        self
    }

    /// Spread `other` into this object.
    pub(crate) fn merge(self, other: ObjectSchema) -> Self {
        let mut merged = other
            .members
            .into_iter()
            .fold(self, |acc, m| acc.member(m.name, m.schema, m.required));
        merged.rules.extend(other.rules);
        merged.open |= other.open;
        merged
    }

    /// Require at least one of `names`.
    pub(crate) fn any_of(mut self, names: &[&str]) -> Self {
        self.rules.push(json!({ "anyOf": presence(names) }));
        self
    }

    /// Require exactly one of `names`.
    pub(crate) fn exactly_one_of(mut self, names: &[&str]) -> Self {
        self.rules.push(json!({ "oneOf": presence(names) }));
        self
    }

    /// Accept members this object does not declare.
    pub(crate) fn open(mut self) -> Self {
        self.open = true;
        self
    }

    /// Names of the required members, declaration order.
    pub(crate) fn required_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.members.iter().filter(|m| m.required).map(|m| m.name)
    }

    pub(crate) fn into_schema(self) -> Value {
        let required: Vec<&str> = self.required_fields().collect();
        let properties: Map<String, Value> = self
            .members
            .into_iter()
            .map(|m| (m.name.to_string(), m.schema))
            .collect();

        let mut schema = Map::new();
        schema.insert("type".into(), json!("object"));
        schema.insert("properties".into(), Value::Object(properties));
        schema.insert("required".into(), json!(required));
        if !self.open {
            schema.insert("additionalProperties".into(), json!(false));
        }
        if !self.rules.is_empty() {
            schema.insert("allOf".into(), Value::Array(self.rules));
        }
        Value::Object(schema)
    }
}

impl From<ObjectSchema> for Value {
    fn from(object: ObjectSchema) -> Self {
        object.into_schema()
    }
}

fn presence(names: &[&str]) -> Value {
    names.iter().map(|n| json!({ "required": [n] })).collect()
}

/// Non-empty string.
pub(crate) fn string() -> Value {
    json!({ "type": "string", "minLength": 1 })
}

/// Absolute URI, e.g. `https://...` or `egendata://...`.
pub(crate) fn uri() -> Value {
    json!({ "type": "string", "format": "uri" })
}

/// Hyphenated UUID of any version.
pub(crate) fn uuid() -> Value {
    json!({ "type": "string", "format": "uuid" })
}

pub(crate) fn uuid_v4() -> Value {
    json!({ "type": "string", "pattern": UUID_V4_PATTERN })
}

/// Compact signed token `header.claims.signature`.
pub(crate) fn compact_jws() -> Value {
    json!({ "type": "string", "pattern": COMPACT_JWS_PATTERN })
}

pub(crate) fn constant(value: &str) -> Value {
    json!({ "const": value })
}

pub(crate) fn one_of(values: &[&str]) -> Value {
    json!({ "enum": values })
}

/// Whole number of seconds since the epoch.
pub(crate) fn numeric_date() -> Value {
    json!({ "type": "integer" })
}

/// Array of `items` with at least `min_items` entries.
pub(crate) fn array(items: impl Into<Value>, min_items: usize) -> Value {
    json!({ "type": "array", "minItems": min_items, "items": items.into() })
}

/// Object whose schema is picked by the string member `tag`.
pub(crate) fn tagged(tag: &str, variants: Vec<(&str, ObjectSchema)>) -> Value {
    let tags: Vec<&str> = variants.iter().map(|(t, _)| *t).collect();
    let branches: Vec<Value> = variants
        .into_iter()
        .map(|(t, variant)| {
            json!({
                "if": { "properties": { tag: { "const": t } }, "required": [tag] },
                "then": variant.into_schema()
            })
        })
        .collect();
    json!({
        "type": "object",
        "properties": { tag: { "enum": tags } },
        "required": [tag],
        "allOf": branches
    })
}

/// `aud`, `exp`, `iat`, `iss`: present on every message.
pub(crate) fn jwt_defaults() -> ObjectSchema {
    ObjectSchema::new()
        .required("aud", string())
        .required("exp", numeric_date())
        .required("iat", numeric_date())
        .required("iss", uri())
}

pub(crate) fn jwk() -> ObjectSchema {
    ObjectSchema::new()
        .optional("kid", string())
        .required("kty", constant("RSA"))
        .required("use", one_of(KEY_USES))
        .required("e", constant("AQAB"))
        .required("n", string())
}

/// A key as served from a key URL. Standard members such as `alg` or
/// `key_ops` may ride along.
pub(crate) fn published_jwk() -> ObjectSchema {
    jwk().open()
}

pub(crate) fn jwks() -> ObjectSchema {
    ObjectSchema::new().required("keys", array(jwk(), 1))
}

pub(crate) fn jose_header() -> ObjectSchema {
    ObjectSchema::new()
        .required("alg", one_of(&ALLOWED_ALGORITHM_NAMES))
        .optional("typ", string())
        .optional("kid", uri())
        .optional("jwk", jwk())
}

fn jwe_recipient() -> ObjectSchema {
    let header = ObjectSchema::new()
        .required("alg", constant("RSA1_5"))
        .optional("kid", uri())
        .optional("jwk", jwk())
        .any_of(&["kid", "jwk"]);
    ObjectSchema::new()
        .required("encrypted_key", string())
        .required("header", header)
}

/// General JWE serialization. Content stays opaque.
pub(crate) fn jwe() -> ObjectSchema {
    ObjectSchema::new()
        .required("recipients", array(jwe_recipient(), 1))
        .optional("protected", string())
        .required("iv", string())
        .required("ciphertext", string())
        .optional("tag", string())
}

pub(crate) fn content_path() -> ObjectSchema {
    ObjectSchema::new()
        .required("domain", uri())
        .required("area", string())
}

/// Members every permission record carries. `type` is either permission type.
pub(crate) fn permission_base() -> ObjectSchema {
    content_path()
        .required("id", uuid())
        .required("type", one_of(PERMISSION_TYPES))
        .required("lawfulBasis", one_of(LAWFUL_BASES))
}

fn read_permission_request() -> ObjectSchema {
    permission_base()
        .required("type", constant("READ"))
        .required("purpose", string())
        .required("jwk", jwk())
}

fn write_permission_request() -> ObjectSchema {
    permission_base()
        .required("type", constant("WRITE"))
        .required("description", string())
}

fn read_permission() -> ObjectSchema {
    permission_base()
        .required("type", constant("READ"))
        .required("purpose", string())
        .required("kid", uri())
}

fn write_permission() -> ObjectSchema {
    permission_base()
        .required("type", constant("WRITE"))
        .required("description", string())
        .required("jwks", jwks())
}

/// Requested permissions: READ needs a reader key, WRITE a description.
pub(crate) fn permission_requests() -> Value {
    array(
        tagged(
            "type",
            vec![
                ("READ", read_permission_request()),
                ("WRITE", write_permission_request()),
            ],
        ),
        1,
    )
}

/// Approved and denied buckets. Either may be absent, neither may be empty.
pub(crate) fn connection_permissions() -> ObjectSchema {
    let approved = array(
        tagged(
            "type",
            vec![("READ", read_permission()), ("WRITE", write_permission())],
        ),
        1,
    );
    let denied = array(permission_base(), 1);
    ObjectSchema::new()
        .optional("approved", approved)
        .optional("denied", denied)
        .any_of(&["approved", "denied"])
}

pub(crate) fn error_descriptor() -> ObjectSchema {
    ObjectSchema::new()
        .required("message", string())
        .optional(
            "status",
            json!({ "type": "integer", "minimum": 0, "maximum": 65535 }),
        )
        .optional("code", string())
        .optional("stack", string())
}

/// `sub` naming the connection.
pub(crate) fn connection_subject() -> ObjectSchema {
    ObjectSchema::new().required("sub", uuid_v4())
}

/// Nested signed envelope passed along verbatim.
pub(crate) fn signed_payload() -> ObjectSchema {
    ObjectSchema::new().required("payload", compact_jws())
}
