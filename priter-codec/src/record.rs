//! The five record shapes spec.md 3 defines, carried as opaque byte
//! slices — the engine deserializes the `K`/`V`/`D`/`P` payloads via an
//! injected, user-supplied codec this crate never sees.

/// Which of the five record shapes a given file/stream is homogeneous
/// over. A single `RecordWriter`/`RecordReader` is fixed to one kind for
/// its whole lifetime, matching "Each file is a sequence of such records"
/// (spec.md 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// `(K, V)` — generic payload frame.
    Kv,
    /// `(P, K, V)` — priority-tagged activation message.
    Pkv,
    /// `(K, iV, cV)` — per-key dual state.
    StateRec,
    /// `(K, iV, D)` — priority-queue entry plus static context.
    PqRec,
    /// `(K, D)` — static-only, loaded once per reducer.
    StaticRec,
}

impl RecordKind {
    /// Number of length-prefixed fields per record of this kind, and so
    /// the number of EOF sentinel values `close` writes (spec.md 4.1:
    /// "2, 3, 3, 3, 2 respectively").
    pub const fn field_count(self) -> usize {
        match self {
            RecordKind::Kv => 2,
            RecordKind::Pkv => 3,
            RecordKind::StateRec => 3,
            RecordKind::PqRec => 3,
            RecordKind::StaticRec => 2,
        }
    }
}

/// One decoded record. Variant always matches the `RecordKind` of the
/// file/stream it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// `appendKV`
    Kv { key: Vec<u8>, value: Vec<u8> },
    /// `appendPKV`
    Pkv {
        priority: Vec<u8>,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    /// `appendStateRec`
    StateRec {
        key: Vec<u8>,
        i_state: Vec<u8>,
        c_state: Vec<u8>,
    },
    /// `appendPQRec`
    PqRec {
        key: Vec<u8>,
        i_state: Vec<u8>,
        static_data: Vec<u8>,
    },
    /// `appendStaticRec`
    StaticRec { key: Vec<u8>, static_data: Vec<u8> },
}

impl Record {
    /// The `RecordKind` this record is shaped as.
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Kv { .. } => RecordKind::Kv,
            Record::Pkv { .. } => RecordKind::Pkv,
            Record::StateRec { .. } => RecordKind::StateRec,
            Record::PqRec { .. } => RecordKind::PqRec,
            Record::StaticRec { .. } => RecordKind::StaticRec,
        }
    }

    /// Fields in on-wire order, for the writer to iterate over.
    pub(crate) fn fields(&self) -> Vec<&[u8]> {
        match self {
            Record::Kv { key, value } => vec![key, value],
            Record::Pkv {
                priority,
                key,
                value,
            } => vec![priority, key, value],
            Record::StateRec {
                key,
                i_state,
                c_state,
            } => vec![key, i_state, c_state],
            Record::PqRec {
                key,
                i_state,
                static_data,
            } => vec![key, i_state, static_data],
            Record::StaticRec { key, static_data } => vec![key, static_data],
        }
    }

    /// Builds a record of `kind` from fields read off the wire, in the
    /// same order `fields()` would produce them.
    pub(crate) fn from_fields(kind: RecordKind, mut fields: Vec<Vec<u8>>) -> Record {
        match kind {
            RecordKind::Kv => Record::Kv {
                value: fields.pop().unwrap(),
                key: fields.pop().unwrap(),
            },
            RecordKind::Pkv => {
                let value = fields.pop().unwrap();
                let key = fields.pop().unwrap();
                let priority = fields.pop().unwrap();
                Record::Pkv {
                    priority,
                    key,
                    value,
                }
            }
            RecordKind::StateRec => {
                let c_state = fields.pop().unwrap();
                let i_state = fields.pop().unwrap();
                let key = fields.pop().unwrap();
                Record::StateRec {
                    key,
                    i_state,
                    c_state,
                }
            }
            RecordKind::PqRec => {
                let static_data = fields.pop().unwrap();
                let i_state = fields.pop().unwrap();
                let key = fields.pop().unwrap();
                Record::PqRec {
                    key,
                    i_state,
                    static_data,
                }
            }
            RecordKind::StaticRec => {
                let static_data = fields.pop().unwrap();
                let key = fields.pop().unwrap();
                Record::StaticRec { key, static_data }
            }
        }
    }
}
