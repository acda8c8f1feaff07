use std::collections::HashMap;

use log::{debug, warn};

use crate::{
    chunk::{ChunkHeader, PERS, tag_name},
    error::DecodeError,
    stream::ByteStream,
};

/// Decodes one object. `version` comes from the `PERS` framing, or is `0` for
/// tag framed objects, which receive the stream rewound to their own header.
pub type Constructor<T> =
    fn(&mut ByteStream<'_>, u32, &Registry<T>) -> Result<T, DecodeError>;

/// Class name and chunk tag dispatch table for one family of decodable objects.
pub struct Registry<T> {
    classes: HashMap<String, Constructor<T>>,
    tags: HashMap<u32, Constructor<T>>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            classes: HashMap::new(),
            tags: HashMap::new(),
        }
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class(mut self, name: &str, constructor: Constructor<T>) -> Self {
        self.classes.insert(name.to_owned(), constructor);
        self
    }

    pub fn with_tag(mut self, tag: u32, constructor: Constructor<T>) -> Self {
        self.tags.insert(tag, constructor);
        self
    }

    pub fn class(&self, name: &str) -> Option<Constructor<T>> {
        self.classes.get(name).copied()
    }

    /// Full tag first, then the low half so two character magics like `BM` resolve.
    pub fn tag(&self, tag: u32) -> Option<Constructor<T>> {
        self.tags
            .get(&tag)
            .or_else(|| self.tags.get(&(tag & 0xFFFF)))
            .copied()
    }

    /// Decodes the object whose chunk starts at the cursor.
    ///
    /// Whatever the outcome, the cursor ends up just past the chunk so the
    /// enclosing object stays in sync.
    pub fn create_from_stream(&self, stream: &mut ByteStream) -> Result<T, DecodeError> {
        let chunk_start = stream.position();
        let header = ChunkHeader::read(stream)?;
        let start = stream.position();

        let res = self.dispatch(stream, chunk_start, &header);

        if let Err(err) = &res {
            warn!("failed to decode chunk `{}`: {err}", tag_name(header.tag));
        }

        stream.seek_clamped(start + header.padded_size() as usize);

        res
    }

    fn dispatch(
        &self,
        stream: &mut ByteStream,
        chunk_start: usize,
        header: &ChunkHeader,
    ) -> Result<T, DecodeError> {
        if header.tag == PERS {
            let class = stream.read_sstring()?;
            let version = stream.read_u32()?;

            debug!("decoding `{class}` version {version}");

            let constructor = self
                .class(&class)
                .ok_or(DecodeError::UnknownClass { class })?;

            return constructor(stream, version, self);
        }

        let constructor = self.tag(header.tag).ok_or_else(|| DecodeError::UnknownClass {
            class: format!("tag `{}`", tag_name(header.tag)),
        })?;

        debug!("decoding tag `{}`", tag_name(header.tag));

        stream.set_position(chunk_start)?;
        constructor(stream, 0, self)
    }
}
