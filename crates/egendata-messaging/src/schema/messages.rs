//! Claims schema of every message type.

use super::fragments::{
    array, connection_permissions, connection_subject, constant, content_path, error_descriptor,
    jwe, jwt_defaults, permission_requests, signed_payload, string, uri, uuid, uuid_v4,
    ObjectSchema,
};
use super::MessageType;

/// Claims schema for `message_type`.
pub(crate) fn claims_schema(message_type: MessageType) -> ObjectSchema {
    let base = jwt_defaults().required("type", constant(message_type.as_str()));
    let body = match message_type {
        // service -> operator
        MessageType::ServiceRegistration => ObjectSchema::new()
            .required("displayName", string())
            .required("description", string())
            .required("iconURI", string())
            .required("jwksURI", uri())
            .required("eventsURI", uri()),

        // device -> operator
        MessageType::AccountRegistration => ObjectSchema::new().required(
            "pds",
            ObjectSchema::new()
                .required("provider", string())
                .optional("access_token", string()),
        ),

        // service -> device
        MessageType::AuthenticationRequest => ObjectSchema::new()
            .required("sid", string())
            .required("eventsURI", uri()),

        // device -> service
        MessageType::ConnectionInit | MessageType::Login => {
            ObjectSchema::new().required("sid", string())
        }

        // service -> device
        MessageType::ConnectionRequest => ObjectSchema::new()
            .optional("permissions", permission_requests())
            .required("sid", uuid_v4())
            .required("displayName", string())
            .required("description", string())
            .required("iconURI", string()),

        // device -> (operator) -> service
        MessageType::Connection => ObjectSchema::new()
            .required("sid", string())
            .merge(connection_subject())
            .optional("permissions", connection_permissions()),

        // device -> operator, operator -> service
        MessageType::ConnectionResponse
        | MessageType::ConnectionEvent
        | MessageType::LoginResponse
        | MessageType::LoginEvent => signed_payload(),

        // service -> operator
        MessageType::PermissionRequest => ObjectSchema::new()
            .required("permissions", permission_requests())
            .optional("sub", uuid())
            .required("sid", uuid_v4()),

        // operator -> service
        MessageType::AccessToken => connection_subject(),

        // service -> operator
        MessageType::DataReadRequest => {
            connection_subject().required("paths", array(content_path(), 1))
        }

        // operator -> service
        MessageType::DataReadResponse => connection_subject().required(
            "paths",
            array(
                content_path()
                    .optional("data", jwe())
                    .optional("error", error_descriptor())
                    .exactly_one_of(&["data", "error"]),
                1,
            ),
        ),

        // service -> operator
        MessageType::DataWrite => connection_subject()
            .required("paths", array(content_path().required("data", jwe()), 1)),
    };
    base.merge(body)
}
