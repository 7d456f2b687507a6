//! PROPVARIANT access.
//!
//! The raw overlay is only read after checking the type tag, and each payload
//! reader matches exactly one tag.

use super::from_guid;
use crate::audio::device::AudioError;
use crate::audio::property::{RawVariant, VariantTag};
use std::mem::ManuallyDrop;
use tracing::debug;
use uuid::Uuid;
use windows::core::{GUID, PCWSTR};
use windows::Win32::System::Com::StructuredStorage::PropVariantClear;
use windows_core::PROPVARIANT;

/// A variant returned by IPropertyStore::GetValue.
///
/// The inner value is never dropped implicitly: [`RawVariant::clear`] (or
/// `Drop`, for variants that were never decoded) runs PropVariantClear, and
/// blob variants are left alone.
pub struct ComVariant {
    inner: ManuallyDrop<PROPVARIANT>,
    cleared: bool,
}

impl ComVariant {
    pub(crate) fn new(inner: PROPVARIANT) -> Self {
        Self {
            inner: ManuallyDrop::new(inner),
            cleared: false,
        }
    }
}

impl RawVariant for ComVariant {
    fn tag(&self) -> VariantTag {
        VariantTag(unsafe { self.inner.as_raw().Anonymous.Anonymous.vt })
    }

    fn bool_payload(&self) -> i16 {
        if self.tag() != VariantTag::BOOL {
            return 0;
        }
        unsafe { self.inner.as_raw().Anonymous.Anonymous.Anonymous.boolVal }
    }

    fn wide_str_payload(&self) -> Option<String> {
        if self.tag() != VariantTag::LPWSTR {
            return None;
        }
        unsafe {
            let ptr = self.inner.as_raw().Anonymous.Anonymous.Anonymous.pwszVal;
            if ptr.is_null() {
                return None;
            }
            let wide = PCWSTR::from_raw(ptr.cast::<u16>());
            Some(String::from_utf16_lossy(wide.as_wide()))
        }
    }

    fn int_payload(&self) -> i32 {
        if self.tag() != VariantTag::UI4 {
            return 0;
        }
        unsafe { self.inner.as_raw().Anonymous.Anonymous.Anonymous.ulVal as i32 }
    }

    fn guid_payload(&self) -> Option<Uuid> {
        if self.tag() != VariantTag::CLSID {
            return None;
        }
        unsafe {
            let ptr = self.inner.as_raw().Anonymous.Anonymous.Anonymous.puuid;
            if ptr.is_null() {
                return None;
            }
            Some(from_guid(&*ptr.cast::<GUID>()))
        }
    }

    fn clear(&mut self) -> Result<(), AudioError> {
        if self.cleared {
            return Ok(());
        }
        self.cleared = true;
        unsafe { PropVariantClear(&mut *self.inner)? };
        Ok(())
    }
}

impl Drop for ComVariant {
    fn drop(&mut self) {
        if self.tag() != VariantTag::BLOB {
            if let Err(e) = self.clear() {
                debug!(error = %e, "PropVariantClear failed");
            }
        }
    }
}
