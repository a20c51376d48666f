/*!
 * Key Management for symmetric keys held on a token
 *
 * This module turns a logical request ("an AES-256 key labelled X") into the
 * mechanism and attribute template a particular vendor's token accepts, and
 * drives generation and import through a [`Device`](crate::hsm::Device).
 */

pub mod attributes;
pub mod config;
pub mod key_type;
pub mod lifecycle;
pub mod mechanism;
pub mod template;
pub mod vendor;

#[cfg(test)]
mod tests;

pub use attributes::Attribute;
pub use attributes::AttributeKind;
pub use attributes::AttributeSet;
pub use attributes::KeyTypeMarker;
pub use config::LifecycleConfig;
pub use config::KEY_LENGTH_OVERRIDE_VAR;
pub use key_type::KeyType;
pub use lifecycle::KeyLifecycleManager;
pub use mechanism::GcmParameters;
pub use mechanism::Mechanism;
pub use template::build_template;
pub use template::TemplateBuilder;
pub use vendor::select_generation_mechanism;
pub use vendor::GcmFraming;
pub use vendor::VendorProfile;
