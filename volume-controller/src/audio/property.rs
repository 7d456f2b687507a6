//! Property store keys and value decoding.
//!
//! Endpoint metadata travels across the COM boundary as PROPVARIANTs: a type
//! tag plus a payload overlay. [`decode`] turns one into a [`PropertyValue`]
//! and releases whatever memory the variant owned.

use super::device::AudioError;
use std::fmt;
use tracing::debug;
use uuid::Uuid;

/// Property key: a format ID plus a property ID within that format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PropertyKey {
    pub fmtid: Uuid,
    pub pid: u32,
}

impl PropertyKey {
    pub const fn new(fmtid: Uuid, pid: u32) -> Self {
        Self { fmtid, pid }
    }
}

impl fmt::Display for PropertyKey {
    /// Braced upper-case format ID, a space, then the property ID.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{:X}}} {}", self.fmtid, self.pid)
    }
}

const DEVPKEY_DEVICE: Uuid = Uuid::from_u128(0xa45c254e_df1c_4efd_8020_67d146a850e0);
const DEVPKEY_DEVICES: Uuid = Uuid::from_u128(0x8c7ed206_3f8a_4827_b3ab_ae9e1faefc6c);
const DEVPKEY_DEVICE_INTERFACE: Uuid = Uuid::from_u128(0x026e516e_b814_414b_83cd_856d6fef4822);

/// Well-known endpoint properties read by [`AudioDevice`](super::AudioDevice).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceProperty {
    /// PKEY_Device_DeviceDesc
    DeviceDesc,
    /// PKEY_Devices_ContainerId
    ContainerId,
    /// PKEY_Device_EnumeratorName
    EnumeratorName,
    /// DEVPKEY_DeviceInterface_FriendlyName
    InterfaceFriendlyName,
    /// PKEY_Device_FriendlyName
    FriendlyName,
}

impl DeviceProperty {
    pub const ALL: [DeviceProperty; 5] = [
        DeviceProperty::DeviceDesc,
        DeviceProperty::ContainerId,
        DeviceProperty::EnumeratorName,
        DeviceProperty::InterfaceFriendlyName,
        DeviceProperty::FriendlyName,
    ];

    pub const fn key(self) -> PropertyKey {
        match self {
            DeviceProperty::DeviceDesc => PropertyKey::new(DEVPKEY_DEVICE, 2),
            DeviceProperty::ContainerId => PropertyKey::new(DEVPKEY_DEVICES, 2),
            DeviceProperty::EnumeratorName => PropertyKey::new(DEVPKEY_DEVICE, 24),
            DeviceProperty::InterfaceFriendlyName => {
                PropertyKey::new(DEVPKEY_DEVICE_INTERFACE, 2)
            }
            DeviceProperty::FriendlyName => PropertyKey::new(DEVPKEY_DEVICE, 14),
        }
    }
}

/// A decoded property value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Bool(bool),
    Str(String),
    /// VT_UI4 payload reinterpreted as signed
    Int(i32),
    Guid(Uuid),
    /// Diagnostic text for tags that are not decoded, e.g. `VT_BLOB:?`
    Unknown(String),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(b) => write!(f, "{b}"),
            PropertyValue::Str(s) => f.write_str(s),
            PropertyValue::Int(i) => write!(f, "{i}"),
            PropertyValue::Guid(g) => write!(f, "{{{g:X}}}"),
            PropertyValue::Unknown(s) => f.write_str(s),
        }
    }
}

/// PROPVARIANT type tag (VARTYPE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VariantTag(pub u16);

impl VariantTag {
    pub const EMPTY: VariantTag = VariantTag(0);
    pub const I4: VariantTag = VariantTag(3);
    pub const BOOL: VariantTag = VariantTag(11);
    pub const UI4: VariantTag = VariantTag(19);
    pub const LPWSTR: VariantTag = VariantTag(31);
    pub const BLOB: VariantTag = VariantTag(65);
    pub const CLSID: VariantTag = VariantTag(72);

    fn name(self) -> Option<&'static str> {
        Some(match self {
            VariantTag::EMPTY => "VT_EMPTY",
            VariantTag::I4 => "VT_I4",
            VariantTag::BOOL => "VT_BOOL",
            VariantTag::UI4 => "VT_UI4",
            VariantTag::LPWSTR => "VT_LPWSTR",
            VariantTag::BLOB => "VT_BLOB",
            VariantTag::CLSID => "VT_CLSID",
            _ => return None,
        })
    }
}

impl fmt::Display for VariantTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{}", self.0),
        }
    }
}

/// A tagged variant as received from a property store.
///
/// Payload readers check the tag themselves and return a neutral value when
/// it does not match, so no reader can misinterpret the overlay.
pub trait RawVariant {
    fn tag(&self) -> VariantTag;

    /// Raw VARIANT_BOOL short.
    fn bool_payload(&self) -> i16;

    /// Wide string payload; `None` for a null pointer.
    fn wide_str_payload(&self) -> Option<String>;

    /// 32-bit payload as signed.
    fn int_payload(&self) -> i32;

    /// Pointed-to GUID; `None` for a null pointer.
    fn guid_payload(&self) -> Option<Uuid>;

    /// Release memory owned by the variant (PropVariantClear).
    fn clear(&mut self) -> Result<(), AudioError>;
}

/// Decode a variant and release what it owns.
///
/// Blob variants are never cleared: PropVariantClear on endpoint blob
/// properties is not supported by the audio subsystem.
pub fn decode<V: RawVariant>(mut variant: V) -> PropertyValue {
    let tag = variant.tag();
    let value = match tag {
        VariantTag::BOOL => PropertyValue::Bool(variant.bool_payload() != 0),
        VariantTag::LPWSTR => PropertyValue::Str(variant.wide_str_payload().unwrap_or_default()),
        VariantTag::UI4 => PropertyValue::Int(variant.int_payload()),
        VariantTag::CLSID => PropertyValue::Guid(variant.guid_payload().unwrap_or_else(Uuid::nil)),
        other => PropertyValue::Unknown(format!("{other}:?")),
    };

    if tag != VariantTag::BLOB {
        if let Err(e) = variant.clear() {
            debug!(%tag, error = %e, "Failed to clear property variant");
        }
    }

    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::device::PlatformError;
    use std::cell::Cell;
    use std::rc::Rc;

    enum Payload {
        Short(i16),
        Wide(Option<String>),
        Int(i32),
        Guid(Option<Uuid>),
        Nothing,
    }

    struct TestVariant {
        tag: VariantTag,
        payload: Payload,
        clears: Rc<Cell<u32>>,
        fail_clear: bool,
    }

    impl TestVariant {
        fn new(tag: VariantTag, payload: Payload) -> (Self, Rc<Cell<u32>>) {
            let clears = Rc::new(Cell::new(0));
            let variant = Self {
                tag,
                payload,
                clears: clears.clone(),
                fail_clear: false,
            };
            (variant, clears)
        }
    }

    impl RawVariant for TestVariant {
        fn tag(&self) -> VariantTag {
            self.tag
        }

        fn bool_payload(&self) -> i16 {
            match self.payload {
                Payload::Short(v) => v,
                _ => 0,
            }
        }

        fn wide_str_payload(&self) -> Option<String> {
            match &self.payload {
                Payload::Wide(s) => s.clone(),
                _ => None,
            }
        }

        fn int_payload(&self) -> i32 {
            match self.payload {
                Payload::Int(v) => v,
                _ => 0,
            }
        }

        fn guid_payload(&self) -> Option<Uuid> {
            match self.payload {
                Payload::Guid(g) => g,
                _ => None,
            }
        }

        fn clear(&mut self) -> Result<(), AudioError> {
            self.clears.set(self.clears.get() + 1);
            if self.fail_clear {
                return Err(AudioError::PlatformCall(PlatformError::new(
                    0x80070057u32 as i32,
                    "The parameter is incorrect.",
                )));
            }
            Ok(())
        }
    }

    #[test]
    fn test_property_key_display() {
        let key = PropertyKey::new(
            Uuid::from_u128(0xa45c254e_df1c_4efd_8020_67d146a850e0),
            14,
        );
        assert_eq!(key.to_string(), "{A45C254E-DF1C-4EFD-8020-67D146A850E0} 14");
        assert_eq!(DeviceProperty::FriendlyName.key(), key);
    }

    #[test]
    fn test_well_known_keys_are_distinct() {
        let keys: std::collections::HashSet<_> =
            DeviceProperty::ALL.iter().map(|p| p.key()).collect();
        assert_eq!(keys.len(), DeviceProperty::ALL.len());
        assert_eq!(
            DeviceProperty::InterfaceFriendlyName.key().to_string(),
            "{026E516E-B814-414B-83CD-856D6FEF4822} 2"
        );
    }

    #[test]
    fn test_decode_bool_nonzero_is_true() {
        let (v, _) = TestVariant::new(VariantTag::BOOL, Payload::Short(-1));
        assert_eq!(decode(v), PropertyValue::Bool(true));

        let (v, _) = TestVariant::new(VariantTag::BOOL, Payload::Short(1));
        assert_eq!(decode(v), PropertyValue::Bool(true));

        let (v, _) = TestVariant::new(VariantTag::BOOL, Payload::Short(0));
        assert_eq!(decode(v), PropertyValue::Bool(false));
    }

    #[test]
    fn test_decode_null_string_is_empty() {
        let (v, clears) = TestVariant::new(VariantTag::LPWSTR, Payload::Wide(None));
        assert_eq!(decode(v), PropertyValue::Str(String::new()));
        assert_eq!(clears.get(), 1);
    }

    #[test]
    fn test_decode_string() {
        let (v, _) = TestVariant::new(
            VariantTag::LPWSTR,
            Payload::Wide(Some("Speakers".to_string())),
        );
        assert_eq!(decode(v), PropertyValue::Str("Speakers".to_string()));
    }

    #[test]
    fn test_decode_ui4_reinterpreted_as_signed() {
        let (v, _) = TestVariant::new(VariantTag::UI4, Payload::Int(-1));
        assert_eq!(decode(v), PropertyValue::Int(-1));

        let (v, _) = TestVariant::new(VariantTag::UI4, Payload::Int(48000));
        assert_eq!(decode(v).to_string(), "48000");
    }

    #[test]
    fn test_decode_guid() {
        let id = Uuid::from_u128(0x8c7ed206_3f8a_4827_b3ab_ae9e1faefc6c);
        let (v, _) = TestVariant::new(VariantTag::CLSID, Payload::Guid(Some(id)));
        assert_eq!(decode(v), PropertyValue::Guid(id));

        let (v, _) = TestVariant::new(VariantTag::CLSID, Payload::Guid(None));
        assert_eq!(decode(v), PropertyValue::Guid(Uuid::nil()));
    }

    #[test]
    fn test_decode_unknown_tags() {
        let (v, clears) = TestVariant::new(VariantTag::I4, Payload::Int(7));
        assert_eq!(decode(v), PropertyValue::Unknown("VT_I4:?".to_string()));
        assert_eq!(clears.get(), 1);

        let (v, _) = TestVariant::new(VariantTag(18), Payload::Nothing);
        assert_eq!(decode(v), PropertyValue::Unknown("18:?".to_string()));
    }

    #[test]
    fn test_blob_is_never_cleared() {
        let (v, clears) = TestVariant::new(VariantTag::BLOB, Payload::Nothing);
        assert_eq!(decode(v), PropertyValue::Unknown("VT_BLOB:?".to_string()));
        assert_eq!(clears.get(), 0);
    }

    #[test]
    fn test_failed_clear_is_tolerated() {
        let (mut v, clears) = TestVariant::new(
            VariantTag::LPWSTR,
            Payload::Wide(Some("HDAUDIO".to_string())),
        );
        v.fail_clear = true;
        assert_eq!(decode(v), PropertyValue::Str("HDAUDIO".to_string()));
        assert_eq!(clears.get(), 1);
    }
}
