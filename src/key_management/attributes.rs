/*!
 * Key object attributes
 *
 * A device-independent model of the PKCS#11 attributes this client submits.
 * Attribute sets keep insertion order and hold each attribute kind at most
 * once, so the template for a request is always the same sequence.
 */

use std::fmt;

use crate::secure_memory::SecureBytes;

/// Value of the key-type attribute (CKA_KEY_TYPE)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyTypeMarker {
    /// CKK_GENERIC_SECRET
    GenericSecret,
    /// CKK_DES3
    Des3,
    /// CKK_AES
    Aes,
    /// CKK_SHA256_HMAC
    Sha256Hmac,
    /// CKK_SHA384_HMAC
    Sha384Hmac,
}

impl KeyTypeMarker {
    /// PKCS#11 CKK_* value
    pub fn code(self) -> u64 {
        match self {
            KeyTypeMarker::GenericSecret => 0x10,
            KeyTypeMarker::Des3 => 0x15,
            KeyTypeMarker::Aes => 0x1f,
            KeyTypeMarker::Sha256Hmac => 0x2b,
            KeyTypeMarker::Sha384Hmac => 0x2c,
        }
    }
}

/// Kind of an attribute, independent of its value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Label,
    Token,
    Sign,
    Encrypt,
    Decrypt,
    Sensitive,
    Private,
    Wrap,
    Unwrap,
    ValueLen,
    KeyType,
    Value,
}

impl AttributeKind {
    /// PKCS#11 CKA_* value
    pub fn code(self) -> u64 {
        match self {
            AttributeKind::Token => 0x001,
            AttributeKind::Private => 0x002,
            AttributeKind::Label => 0x003,
            AttributeKind::Value => 0x011,
            AttributeKind::KeyType => 0x100,
            AttributeKind::Sensitive => 0x103,
            AttributeKind::Encrypt => 0x104,
            AttributeKind::Decrypt => 0x105,
            AttributeKind::Wrap => 0x106,
            AttributeKind::Unwrap => 0x107,
            AttributeKind::Sign => 0x108,
            AttributeKind::ValueLen => 0x161,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AttributeKind::Label => "CKA_LABEL",
            AttributeKind::Token => "CKA_TOKEN",
            AttributeKind::Sign => "CKA_SIGN",
            AttributeKind::Encrypt => "CKA_ENCRYPT",
            AttributeKind::Decrypt => "CKA_DECRYPT",
            AttributeKind::Sensitive => "CKA_SENSITIVE",
            AttributeKind::Private => "CKA_PRIVATE",
            AttributeKind::Wrap => "CKA_WRAP",
            AttributeKind::Unwrap => "CKA_UNWRAP",
            AttributeKind::ValueLen => "CKA_VALUE_LEN",
            AttributeKind::KeyType => "CKA_KEY_TYPE",
            AttributeKind::Value => "CKA_VALUE",
        }
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single (kind, value) attribute
#[derive(Debug, Clone)]
pub enum Attribute {
    /// Persistent object name
    Label(String),
    /// Object persists on the token
    Token(bool),
    Sign(bool),
    Encrypt(bool),
    Decrypt(bool),
    Sensitive(bool),
    Private(bool),
    Wrap(bool),
    Unwrap(bool),
    /// Key length in bytes
    ValueLen(usize),
    KeyType(KeyTypeMarker),
    /// Raw key material, only present on import
    Value(SecureBytes),
}

impl Attribute {
    pub fn kind(&self) -> AttributeKind {
        match self {
            Attribute::Label(_) => AttributeKind::Label,
            Attribute::Token(_) => AttributeKind::Token,
            Attribute::Sign(_) => AttributeKind::Sign,
            Attribute::Encrypt(_) => AttributeKind::Encrypt,
            Attribute::Decrypt(_) => AttributeKind::Decrypt,
            Attribute::Sensitive(_) => AttributeKind::Sensitive,
            Attribute::Private(_) => AttributeKind::Private,
            Attribute::Wrap(_) => AttributeKind::Wrap,
            Attribute::Unwrap(_) => AttributeKind::Unwrap,
            Attribute::ValueLen(_) => AttributeKind::ValueLen,
            Attribute::KeyType(_) => AttributeKind::KeyType,
            Attribute::Value(_) => AttributeKind::Value,
        }
    }

    /// Boolean value of a flag attribute
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Attribute::Token(v)
            | Attribute::Sign(v)
            | Attribute::Encrypt(v)
            | Attribute::Decrypt(v)
            | Attribute::Sensitive(v)
            | Attribute::Private(v)
            | Attribute::Wrap(v)
            | Attribute::Unwrap(v) => Some(*v),
            _ => None,
        }
    }
}

/// Ordered attribute template with at most one attribute per kind
#[derive(Debug, Clone, Default)]
pub struct AttributeSet {
    attributes: Vec<Attribute>,
}

impl AttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an attribute.
    ///
    /// A new kind is appended. An existing kind is replaced in place and the
    /// previous attribute is returned.
    pub fn insert(&mut self, attribute: Attribute) -> Option<Attribute> {
        let kind = attribute.kind();
        match self.attributes.iter_mut().find(|a| a.kind() == kind) {
            Some(slot) => Some(std::mem::replace(slot, attribute)),
            None => {
                self.attributes.push(attribute);
                None
            }
        }
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with(mut self, attribute: Attribute) -> Self {
        self.insert(attribute);
        self
    }

    pub fn get(&self, kind: AttributeKind) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.kind() == kind)
    }

    pub fn contains(&self, kind: AttributeKind) -> bool {
        self.get(kind).is_some()
    }

    pub fn label(&self) -> Option<&str> {
        match self.get(AttributeKind::Label) {
            Some(Attribute::Label(label)) => Some(label),
            _ => None,
        }
    }

    pub fn value_len(&self) -> Option<usize> {
        match self.get(AttributeKind::ValueLen) {
            Some(Attribute::ValueLen(len)) => Some(*len),
            _ => None,
        }
    }

    pub fn key_type(&self) -> Option<KeyTypeMarker> {
        match self.get(AttributeKind::KeyType) {
            Some(Attribute::KeyType(marker)) => Some(*marker),
            _ => None,
        }
    }

    pub fn value(&self) -> Option<&SecureBytes> {
        match self.get(AttributeKind::Value) {
            Some(Attribute::Value(value)) => Some(value),
            _ => None,
        }
    }

    /// Value of a boolean attribute; `None` when absent
    pub fn flag(&self, kind: AttributeKind) -> Option<bool> {
        self.get(kind).and_then(Attribute::as_flag)
    }

    /// Attribute kinds in template order
    pub fn kinds(&self) -> Vec<AttributeKind> {
        self.attributes.iter().map(Attribute::kind).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Attribute> {
        self.attributes.iter()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

impl<'a> IntoIterator for &'a AttributeSet {
    type Item = &'a Attribute;
    type IntoIter = std::slice::Iter<'a, Attribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.attributes.iter()
    }
}

impl fmt::Display for AttributeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.attributes.iter().map(|a| a.kind().name()).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_replaces_in_place() {
        let mut set = AttributeSet::new()
            .with(Attribute::Label("first".to_string()))
            .with(Attribute::Token(true))
            .with(Attribute::ValueLen(16));

        let previous = set.insert(Attribute::Label("second".to_string()));

        assert!(matches!(previous, Some(Attribute::Label(ref l)) if l == "first"));
        assert_eq!(set.len(), 3);
        assert_eq!(
            set.kinds(),
            vec![AttributeKind::Label, AttributeKind::Token, AttributeKind::ValueLen]
        );
        assert_eq!(set.label(), Some("second"));
    }

    #[test]
    fn test_display_lists_kinds_only() {
        let set = AttributeSet::new()
            .with(Attribute::Label("k".to_string()))
            .with(Attribute::Value(SecureBytes::new(&[0xde, 0xad])));
        assert_eq!(set.to_string(), "[CKA_LABEL, CKA_VALUE]");
        assert!(!format!("{:?}", set).contains("222"));
    }

    #[test]
    fn test_typed_accessors() {
        let set = AttributeSet::new()
            .with(Attribute::KeyType(KeyTypeMarker::Aes))
            .with(Attribute::Encrypt(true))
            .with(Attribute::ValueLen(32));
        assert_eq!(set.key_type(), Some(KeyTypeMarker::Aes));
        assert_eq!(set.flag(AttributeKind::Encrypt), Some(true));
        assert_eq!(set.flag(AttributeKind::Decrypt), None);
        assert_eq!(set.value_len(), Some(32));
        assert!(set.value().is_none());
    }
}
