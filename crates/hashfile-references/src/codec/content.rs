use crate::codec::wire::{Reader, Writer};
use crate::codec::Codec;
use crate::content_key::ContentKey;
use crate::content_keys::ContentKeys;
use crate::error::{ReferenceError, Result};
use crate::pointer::Pointer;

/// Encoded size of a [`Pointer`]: `from` and `length` as `u64`.
pub(crate) const POINTER_LEN: usize = 16;
/// Encoded size of a [`ContentKey`]: kind, hash and pointer.
pub(crate) const CONTENT_KEY_LEN: usize = 4 + 32 + POINTER_LEN;

pub(super) fn write_pointer(writer: &mut Writer, pointer: &Pointer) {
    writer.u64(pointer.from());
    writer.u64(pointer.length());
}

pub(super) fn read_pointer(reader: &mut Reader<'_>) -> Result<Pointer> {
    let from = reader.u64()?;
    let length = reader.u64()?;
    Pointer::new(from, length).map_err(|err| match err {
        ReferenceError::Validation(reason) => reader.error(reason),
        other => other,
    })
}

pub(super) fn write_content_key(writer: &mut Writer, key: &ContentKey) {
    writer.u32(key.kind());
    writer.hash(&key.hash());
    write_pointer(writer, &key.pointer());
}

pub(super) fn read_content_key(reader: &mut Reader<'_>) -> Result<ContentKey> {
    let kind = reader.u32()?;
    let hash = reader.hash()?;
    let pointer = read_pointer(reader)?;
    Ok(ContentKey::new(kind, hash, pointer))
}

/// Writes a `u32` count followed by that many content keys.
pub(super) fn write_key_list(
    writer: &mut Writer,
    section: &'static str,
    keys: &[ContentKey],
) -> Result<()> {
    writer.count(section, keys.len())?;
    for key in keys {
        write_content_key(writer, key);
    }
    Ok(())
}

pub(super) fn read_key_list(reader: &mut Reader<'_>) -> Result<Vec<ContentKey>> {
    let count = reader.count(CONTENT_KEY_LEN)?;
    let mut keys = Vec::with_capacity(count);
    for _ in 0..count {
        keys.push(read_content_key(reader)?);
    }
    Ok(keys)
}

/// Codec for a bare [`Pointer`].
#[derive(Clone, Copy, Debug, Default)]
pub struct PointerCodec;

impl Codec for PointerCodec {
    type Entity = Pointer;

    fn encode(&self, pointer: &Pointer) -> Result<Vec<u8>> {
        let mut writer = Writer::new();
        write_pointer(&mut writer, pointer);
        Ok(writer.into_bytes())
    }

    fn decode(&self, data: &[u8]) -> Result<Pointer> {
        let mut reader = Reader::new("pointer", data);
        let pointer = read_pointer(&mut reader)?;
        reader.finish()?;
        Ok(pointer)
    }
}

/// Codec for a single [`ContentKey`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ContentKeyCodec;

impl Codec for ContentKeyCodec {
    type Entity = ContentKey;

    fn encode(&self, key: &ContentKey) -> Result<Vec<u8>> {
        let mut writer = Writer::new();
        write_content_key(&mut writer, key);
        Ok(writer.into_bytes())
    }

    fn decode(&self, data: &[u8]) -> Result<ContentKey> {
        let mut reader = Reader::new("content key", data);
        let key = read_content_key(&mut reader)?;
        reader.finish()?;
        Ok(key)
    }
}

/// Codec for a [`ContentKeys`] index, written in `(kind, hash)` order.
#[derive(Clone, Copy, Debug, Default)]
pub struct ContentKeysCodec;

impl Codec for ContentKeysCodec {
    type Entity = ContentKeys;

    fn encode(&self, keys: &ContentKeys) -> Result<Vec<u8>> {
        let mut writer = Writer::new();
        write_key_list(&mut writer, "content keys", keys.list())?;
        Ok(writer.into_bytes())
    }

    fn decode(&self, data: &[u8]) -> Result<ContentKeys> {
        let mut reader = Reader::new("content keys", data);
        let list = read_key_list(&mut reader)?;
        reader.finish()?;
        ContentKeys::from_list(list).map_err(|err| match err {
            ReferenceError::Validation(reason) => ReferenceError::format("content keys", reason),
            other => other,
        })
    }
}
