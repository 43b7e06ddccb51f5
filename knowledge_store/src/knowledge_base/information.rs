//! Information blobs and the context points they hang off.

use std::io::{Read, Write};

use semantic_model::{
    content_fingerprint, now_millis, system_keys, validate_name, ContextCoordinates, KbError,
    KbResult, DEFAULT_CONTENT_TYPE,
};

use super::PropertyHolder;

/// A content payload with metadata kept in the system property namespace.
pub trait Information: PropertyHolder {
    fn content_as_bytes(&self) -> KbResult<Vec<u8>>;

    fn content_length(&self) -> KbResult<u64>;

    /// Replace the payload and stamp the last-modified time in one step.
    fn write_content(&self, content: &[u8], modified_at: i64) -> KbResult<()>;

    /// Replace the payload. The creation time is kept.
    fn set_content(&self, content: &[u8]) -> KbResult<()> {
        self.write_content(content, now_millis())
    }

    /// Read exactly `len` bytes from `reader` as the new payload.
    fn set_content_from_reader(&self, reader: &mut dyn Read, len: u64) -> KbResult<()> {
        let mut buf = Vec::new();
        reader.take(len).read_to_end(&mut buf)?;
        if (buf.len() as u64) < len {
            return Err(KbError::StorageFault(format!(
                "content stream ended after {} of {} bytes",
                buf.len(),
                len
            )));
        }
        self.set_content(&buf)
    }

    fn set_content_string(&self, content: &str) -> KbResult<()> {
        self.set_content(content.as_bytes())
    }

    fn remove_content(&self) -> KbResult<()> {
        self.set_content(&[])
    }

    /// Write the payload to `sink`.
    fn stream_content(&self, sink: &mut dyn Write) -> KbResult<()> {
        sink.write_all(&self.content_as_bytes()?)?;
        Ok(())
    }

    /// The payload as UTF-8 text.
    fn content_as_string(&self) -> KbResult<String> {
        String::from_utf8(self.content_as_bytes()?).map_err(KbError::storage)
    }

    fn content_type(&self) -> KbResult<String> {
        Ok(self
            .property(system_keys::CONTENT_TYPE)?
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()))
    }

    fn set_content_type(&self, content_type: &str) -> KbResult<()> {
        self.write_property(system_keys::CONTENT_TYPE, Some(content_type))
    }

    fn creation_time(&self) -> KbResult<i64> {
        read_millis(self, system_keys::CREATION_TIME)
    }

    fn last_modified(&self) -> KbResult<i64> {
        read_millis(self, system_keys::LAST_MODIFIED)
    }

    /// Identifier issued when the information was created.
    fn unique_id(&self) -> KbResult<String> {
        Ok(self.property(system_keys::INFO_ID)?.unwrap_or_default())
    }

    fn name(&self) -> KbResult<Option<String>> {
        self.property(system_keys::INFO_NAME)
    }

    /// Names must not contain `/` or `\`.
    fn set_name(&self, name: &str) -> KbResult<()> {
        validate_name(name)?;
        self.write_property(system_keys::INFO_NAME, Some(name))
    }

    /// See [`content_fingerprint`].
    fn fingerprint(&self) -> KbResult<i32> {
        Ok(content_fingerprint(&self.content_as_bytes()?))
    }
}

/// A point in the five-dimensional context space holding information.
pub trait ContextPoint {
    type Info: Information;

    /// Each dimension reported by the first SI of the tag it references.
    /// Dimensions whose tag was removed read as `None`.
    fn coordinates(&self) -> KbResult<ContextCoordinates>;

    /// Attach a new information object holding `content`.
    fn add_information(&self, content: &[u8]) -> KbResult<Self::Info>;

    /// Attached information in insertion order.
    fn information(&self) -> KbResult<Vec<Self::Info>>;

    /// Detach and delete `info`. Fails with `NotFound` if it is not attached here.
    fn remove_information(&self, info: &Self::Info) -> KbResult<()>;

    fn information_count(&self) -> KbResult<usize> {
        Ok(self.information()?.len())
    }
}

fn read_millis<H: PropertyHolder + ?Sized>(holder: &H, key: &str) -> KbResult<i64> {
    match holder.property(key)? {
        Some(value) => value.parse().map_err(KbError::storage),
        None => Ok(0),
    }
}
