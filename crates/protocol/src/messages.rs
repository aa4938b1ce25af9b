use serde_json::Value;

use crate::envelope::Envelope;
use crate::fields::Field;

/// Messages the host pushes into the application.
#[derive(Debug, Clone, PartialEq)]
pub enum InfoForApp {
    /// Startup greeting with a caller-supplied payload.
    Get { data: Value },
    /// A document field's current value after a remote change.
    Updated { field: Field, value: Value },
}

/// Messages the application sends to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum InfoForHost {
    /// Request to write one document field.
    Update { field: Field, value: Value },
}

/// An envelope whose tag matches no known message.
///
/// Carries the original tag and payload so callers can log or forward it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("unrecognized message tag `{tag}`")]
pub struct UnknownTag {
    pub tag: String,
    pub data: Value,
}

impl From<InfoForApp> for Envelope {
    fn from(msg: InfoForApp) -> Self {
        match msg {
            InfoForApp::Get { data } => Self::new("Get", data),
            InfoForApp::Updated { field, value } => Self::new(field.updated_tag(), value),
        }
    }
}

impl TryFrom<Envelope> for InfoForApp {
    type Error = UnknownTag;

    fn try_from(env: Envelope) -> Result<Self, Self::Error> {
        if env.tag == "Get" {
            return Ok(Self::Get { data: env.data });
        }
        for field in Field::ALL {
            if env.tag == field.updated_tag() {
                return Ok(Self::Updated {
                    field,
                    value: env.data,
                });
            }
        }
        Err(UnknownTag {
            tag: env.tag,
            data: env.data,
        })
    }
}

impl From<InfoForHost> for Envelope {
    fn from(msg: InfoForHost) -> Self {
        match msg {
            InfoForHost::Update { field, value } => Self::new(field.update_tag(), value),
        }
    }
}

impl TryFrom<Envelope> for InfoForHost {
    type Error = UnknownTag;

    fn try_from(env: Envelope) -> Result<Self, Self::Error> {
        for field in Field::ALL {
            if env.tag == field.update_tag() {
                return Ok(Self::Update {
                    field,
                    value: env.data,
                });
            }
        }
        Err(UnknownTag {
            tag: env.tag,
            data: env.data,
        })
    }
}
