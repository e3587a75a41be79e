//! Persistent key/value preferences.
//!
//! Entries live in a small chained hash table; a lookup moves the entry it
//! finds to the front of its bucket. The store is saved to `surge.prefs` in
//! the per-user config folder in a versioned little-endian format:
//!
//! ```text
//! header: "SURGEPREFS" | 0 0 | u32 version | u32 prefsid hash | u32 entry count
//! entry:  u8 type | u32 size | key | '\0' | value
//! ```

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use surge_core::codec::{decode_f64, encode_f64, read_u32, read_u8, write_u32, write_u8};
use surge_vfs::Avfs;

use crate::error::{ScriptError, ScriptResult};

/// File name of the store, relative to the config root.
pub const PREFS_FILE: &str = "surge.prefs";

const MAGIC: &[u8; 10] = b"SURGEPREFS";
const BUCKET_COUNT: usize = 31;
const PREFSID_MAX_LEN: usize = 80;

/// Type of a stored value. The discriminant is the on-disk type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PrefsType {
    Null = 0,
    Int32 = 1,
    Float64 = 2,
    String = 3,
    Bool = 4,
}

impl PrefsType {
    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(PrefsType::Null),
            1 => Some(PrefsType::Int32),
            2 => Some(PrefsType::Float64),
            3 => Some(PrefsType::String),
            4 => Some(PrefsType::Bool),
            _ => None,
        }
    }

    /// One-character code of the type, as shown to scripts.
    pub fn code(self) -> char {
        match self {
            PrefsType::Null => '\0',
            PrefsType::Int32 => 'i',
            PrefsType::Float64 => 'f',
            PrefsType::String => 's',
            PrefsType::Bool => 'b',
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PrefsValue {
    Null,
    Int32(i32),
    Float64(f64),
    String(String),
    Bool(bool),
}

impl PrefsValue {
    pub fn kind(&self) -> PrefsType {
        match self {
            PrefsValue::Null => PrefsType::Null,
            PrefsValue::Int32(_) => PrefsType::Int32,
            PrefsValue::Float64(_) => PrefsType::Float64,
            PrefsValue::String(_) => PrefsType::String,
            PrefsValue::Bool(_) => PrefsType::Bool,
        }
    }

    fn encode(&self) -> Vec<u8> {
        match self {
            PrefsValue::Null => Vec::new(),
            PrefsValue::Int32(value) => value.to_le_bytes().to_vec(),
            PrefsValue::Float64(value) => encode_f64(*value),
            PrefsValue::String(text) => text.as_bytes().to_vec(),
            PrefsValue::Bool(value) => vec![u8::from(*value)],
        }
    }
}

/// Jenkins' one-at-a-time hash.
pub fn hash_key(key: &str) -> u32 {
    let mut hash: u32 = 0;
    for &byte in key.as_bytes() {
        hash = hash.wrapping_add(u32::from(byte));
        hash = hash.wrapping_add(hash << 10);
        hash ^= hash >> 6;
    }
    hash = hash.wrapping_add(hash << 3);
    hash ^= hash >> 11;
    hash.wrapping_add(hash << 15)
}

/// A prefs id is 1 to 80 lowercase ASCII letters and digits.
pub fn is_valid_prefsid(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= PREFSID_MAX_LEN
        && id.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}

/// Keys and strings are stored NUL-terminated; anything past a NUL is dropped.
fn until_nul(text: &str) -> &str {
    text.split('\0').next().unwrap_or_default()
}

fn c_string(bytes: &[u8]) -> String {
    let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..len]).into_owned()
}

fn invalid_data(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

#[derive(Debug)]
struct Entry {
    key: String,
    hash: u32,
    value: PrefsValue,
}

/// A named preference store backed by a file.
#[derive(Debug)]
pub struct Prefs {
    id: String,
    path: PathBuf,
    buckets: Vec<VecDeque<Entry>>,
}

impl Prefs {
    /// Opens the store `prefsid` in the config root of the filesystem.
    ///
    /// An empty id selects the game id. The file is read if present; a missing
    /// or corrupt file gives an empty store.
    pub fn create(prefsid: &str, avfs: &mut Avfs) -> ScriptResult<Prefs> {
        let id = if prefsid.is_empty() { avfs.gameid() } else { prefsid }.to_string();
        if !is_valid_prefsid(&id) {
            return Err(ScriptError::InvalidPrefsId(id));
        }
        let path = avfs.create_config(PREFS_FILE)?;
        Prefs::open(&id, path)
    }

    /// Opens the store `prefsid` backed by the file at `path`.
    pub fn open(prefsid: &str, path: impl Into<PathBuf>) -> ScriptResult<Prefs> {
        if !is_valid_prefsid(prefsid) {
            return Err(ScriptError::InvalidPrefsId(prefsid.to_string()));
        }
        let mut prefs = Prefs {
            id: prefsid.to_string(),
            path: path.into(),
            buckets: (0..BUCKET_COUNT).map(|_| VecDeque::new()).collect(),
        };
        prefs.load();
        Ok(prefs)
    }

    /// Saves the store and drops it.
    pub fn destroy(self) {
        if let Err(err) = self.save() {
            log::error!("Prefs \"{}\" were not saved: {err}", self.id);
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(VecDeque::is_empty)
    }

    fn bucket_of(hash: u32) -> usize {
        hash as usize % BUCKET_COUNT
    }

    /// Finds an entry and moves it to the front of its bucket.
    fn find(&mut self, key: &str) -> Option<&Entry> {
        let key = until_nul(key);
        let hash = hash_key(key);
        let bucket = &mut self.buckets[Self::bucket_of(hash)];
        let at = bucket.iter().position(|e| e.hash == hash && e.key == key)?;
        if at > 0 {
            let entry = bucket.remove(at)?;
            bucket.push_front(entry);
        }
        bucket.front()
    }

    fn remove(&mut self, key: &str) -> bool {
        let key = until_nul(key);
        let hash = hash_key(key);
        let bucket = &mut self.buckets[Self::bucket_of(hash)];
        match bucket.iter().position(|e| e.hash == hash && e.key == key) {
            Some(at) => bucket.remove(at).is_some(),
            None => false,
        }
    }

    /// Stores a value, replacing any previous value of the key.
    pub fn set(&mut self, key: &str, value: PrefsValue) {
        let value = match value {
            PrefsValue::String(text) => PrefsValue::String(until_nul(&text).to_string()),
            other => other,
        };
        let key = until_nul(key);
        self.remove(key);

        let hash = hash_key(key);
        self.buckets[Self::bucket_of(hash)].push_front(Entry {
            key: key.to_string(),
            hash,
            value,
        });
    }

    pub fn get(&mut self, key: &str) -> Option<&PrefsValue> {
        self.find(key).map(|e| &e.value)
    }

    /// The string under `key`, or `""` if there is no string there.
    pub fn get_string(&mut self, key: &str) -> &str {
        match self.get(key) {
            Some(PrefsValue::String(text)) => text.as_str(),
            _ => "",
        }
    }

    pub fn get_int(&mut self, key: &str) -> i32 {
        match self.get(key) {
            Some(PrefsValue::Int32(value)) => *value,
            _ => 0,
        }
    }

    pub fn get_double(&mut self, key: &str) -> f64 {
        match self.get(key) {
            Some(PrefsValue::Float64(value)) => *value,
            _ => 0.0,
        }
    }

    pub fn get_bool(&mut self, key: &str) -> bool {
        matches!(self.get(key), Some(PrefsValue::Bool(true)))
    }

    pub fn set_string(&mut self, key: &str, value: &str) {
        self.set(key, PrefsValue::String(value.to_string()));
    }

    pub fn set_int(&mut self, key: &str, value: i32) {
        self.set(key, PrefsValue::Int32(value));
    }

    pub fn set_double(&mut self, key: &str, value: f64) {
        self.set(key, PrefsValue::Float64(value));
    }

    pub fn set_bool(&mut self, key: &str, value: bool) {
        self.set(key, PrefsValue::Bool(value));
    }

    pub fn set_null(&mut self, key: &str) {
        self.set(key, PrefsValue::Null);
    }

    pub fn item_type(&mut self, key: &str) -> Option<PrefsType> {
        self.get(key).map(PrefsValue::kind)
    }

    /// Type code of the item under `key`; `'-'` if there is none.
    pub fn item_code(&mut self, key: &str) -> char {
        self.item_type(key).map_or('-', PrefsType::code)
    }

    pub fn has_item(&mut self, key: &str) -> bool {
        self.find(key).is_some()
    }

    /// Deletes an item. Returns whether it existed.
    pub fn delete_item(&mut self, key: &str) -> bool {
        self.remove(key)
    }

    pub fn clear(&mut self) {
        self.buckets.iter_mut().for_each(VecDeque::clear);
    }

    fn load(&mut self) {
        log::info!("Loading prefs from file \"{}\"...", self.path.display());
        match self.read_file() {
            Ok(count) => log::debug!("Loaded {count} prefs entries"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log::info!("Can't read prefs file: {err}");
                self.clear();
            }
            Err(err) => {
                log::warn!("Prefs file is corrupt: {err}");
                self.clear();
            }
        }
    }

    fn read_file(&mut self) -> io::Result<usize> {
        let mut reader = BufReader::new(File::open(&self.path)?);

        let mut magic = [0u8; 10];
        reader.read_exact(&mut magic)?;
        let mut unused = [0u8; 2];
        reader.read_exact(&mut unused)?;
        let version = read_u32(&mut reader)?;
        let prefsid_hash = read_u32(&mut reader)?;
        let count = read_u32(&mut reader)?;

        if &magic != MAGIC {
            return Err(invalid_data("invalid prefs file signature".to_string()));
        }
        if version > surge_core::VERSION_CODE {
            log::warn!("Found newer version of prefs file: engine upgrade is advised");
        }
        if prefsid_hash != hash_key(&self.id) {
            return Err(invalid_data("invalid prefs file hash".to_string()));
        }

        for _ in 0..count {
            let (key, value) = read_entry(&mut reader)?;
            self.set(&key, value);
        }
        Ok(count as usize)
    }

    /// Writes the store to its file.
    pub fn save(&self) -> ScriptResult<()> {
        log::info!("Saving prefs to file \"{}\"...", self.path.display());
        self.write_file().map_err(|err| {
            log::error!("Can't save prefs to file: {err}");
            ScriptError::from(err)
        })
    }

    fn write_file(&self) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(&self.path)?);
        writer.write_all(MAGIC)?;
        writer.write_all(&[0, 0])?;
        write_u32(&mut writer, surge_core::VERSION_CODE)?;
        write_u32(&mut writer, hash_key(&self.id))?;
        write_u32(&mut writer, self.len() as u32)?;

        for entry in self.buckets.iter().flatten() {
            let value = entry.value.encode();
            write_u8(&mut writer, entry.value.kind() as u8)?;
            write_u32(&mut writer, (entry.key.len() + 1 + value.len()) as u32)?;
            writer.write_all(entry.key.as_bytes())?;
            writer.write_all(&[0])?;
            writer.write_all(&value)?;
        }
        writer.flush()
    }
}

/// Splits an entry payload into key and value bytes.
fn split_payload(data: &[u8]) -> Option<(&[u8], &[u8])> {
    let last = data.len().checked_sub(1)?;
    let key_len = data[..last].iter().position(|&b| b == 0).unwrap_or(last);
    Some((&data[..key_len], &data[key_len + 1..]))
}

fn read_entry<R: Read>(reader: &mut R) -> io::Result<(String, PrefsValue)> {
    let tag = read_u8(reader)?;
    let size = read_u32(reader)? as usize;
    let mut data = Vec::new();
    reader.by_ref().take(size as u64).read_to_end(&mut data)?;
    if data.len() != size {
        return Err(io::Error::from(io::ErrorKind::UnexpectedEof));
    }

    let Some(kind) = PrefsType::from_tag(tag) else {
        // unknown types are kept as null entries
        return Ok((c_string(&data), PrefsValue::Null));
    };
    let corrupt = || invalid_data(format!("bad prefs entry of type {tag} and size {size}"));
    let (key, value) = split_payload(&data).ok_or_else(corrupt)?;

    let value = match kind {
        PrefsType::Null if value.is_empty() => PrefsValue::Null,
        PrefsType::Int32 => {
            let bytes = <[u8; 4]>::try_from(value).map_err(|_| corrupt())?;
            PrefsValue::Int32(i32::from_le_bytes(bytes))
        }
        PrefsType::Float64 if !value.is_empty() => PrefsValue::Float64(decode_f64(value).unwrap_or(0.0)),
        PrefsType::String => PrefsValue::String(c_string(value)),
        PrefsType::Bool if value.len() == 1 => PrefsValue::Bool(value[0] != 0),
        _ => return Err(corrupt()),
    };
    Ok((c_string(key), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn store(dir: &tempfile::TempDir) -> Prefs {
        Prefs::open("demo", dir.path().join(PREFS_FILE)).unwrap()
    }

    #[test]
    fn jenkins_hash() {
        assert_eq!(hash_key(""), 0);
        assert_eq!(hash_key("a"), 0xca2e9442);
        assert_eq!(hash_key("demo"), 4210038643);
    }

    #[test]
    fn prefsid_validation() {
        assert!(is_valid_prefsid("surge"));
        assert!(is_valid_prefsid("game2"));
        assert!(is_valid_prefsid(&"a".repeat(80)));
        assert!(!is_valid_prefsid(&"a".repeat(81)));
        assert!(!is_valid_prefsid(""));
        assert!(!is_valid_prefsid("Surge"));
        assert!(!is_valid_prefsid("my-game"));

        let dir = tempfile::tempdir().unwrap();
        let result = Prefs::open("Bad Id", dir.path().join(PREFS_FILE));
        assert!(matches!(result, Err(ScriptError::InvalidPrefsId(_))));
    }

    #[test]
    fn values_survive_a_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut prefs = store(&dir);
        prefs.set_int("score", 42);
        prefs.set_double("rate", 3.14);
        prefs.set_string("name", "Surge");
        prefs.set_bool("sound", true);
        prefs.set_null("nothing");
        prefs.set_double("big", f64::NEG_INFINITY);
        prefs.destroy();

        let mut prefs = store(&dir);
        assert_eq!(prefs.len(), 6);
        assert_eq!(prefs.get_int("score"), 42);
        assert_eq!(prefs.get_double("rate"), 3.14);
        assert_eq!(prefs.get_string("name"), "Surge");
        assert!(prefs.get_bool("sound"));
        assert_eq!(prefs.item_type("nothing"), Some(PrefsType::Null));
        assert_eq!(prefs.get_double("big"), f64::NEG_INFINITY);
    }

    #[test]
    fn mismatched_getters_return_zero_values() {
        let dir = tempfile::tempdir().unwrap();
        let mut prefs = store(&dir);
        prefs.set_string("score", "42");

        assert_eq!(prefs.get_int("score"), 0);
        assert_eq!(prefs.get_double("score"), 0.0);
        assert!(!prefs.get_bool("score"));
        assert_eq!(prefs.get_string("missing"), "");
    }

    #[test]
    fn item_codes() {
        let dir = tempfile::tempdir().unwrap();
        let mut prefs = store(&dir);
        prefs.set_null("n");
        prefs.set_int("i", 1);
        prefs.set_double("f", 1.0);
        prefs.set_string("s", "x");
        prefs.set_bool("b", false);

        let codes: String = ["n", "i", "f", "s", "b", "?"].iter().map(|k| prefs.item_code(k)).collect();
        assert_eq!(codes, "\0ifsb-");
    }

    #[test]
    fn setting_replaces_and_deleting_removes() {
        let dir = tempfile::tempdir().unwrap();
        let mut prefs = store(&dir);
        prefs.set_int("lives", 3);
        prefs.set_string("lives", "many");
        assert_eq!(prefs.len(), 1);
        assert_eq!(prefs.item_type("lives"), Some(PrefsType::String));

        assert!(prefs.delete_item("lives"));
        assert!(!prefs.delete_item("lives"));
        assert!(!prefs.has_item("lives"));
        assert!(prefs.is_empty());
    }

    #[test]
    fn lookup_moves_entry_to_bucket_front() {
        let dir = tempfile::tempdir().unwrap();
        let mut prefs = store(&dir);
        // all four keys share a bucket
        for key in ["k0", "k25", "k31", "k59"] {
            prefs.set_int(key, 1);
        }
        let bucket = Prefs::bucket_of(hash_key("k0"));
        assert_eq!(prefs.buckets[bucket].front().unwrap().key, "k59");

        assert!(prefs.has_item("k25"));
        assert_eq!(prefs.buckets[bucket].front().unwrap().key, "k25");
        assert_eq!(prefs.buckets[bucket].len(), 4);
    }

    #[test]
    fn corrupt_magic_gives_empty_store_and_is_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PREFS_FILE);
        fs::write(&path, b"NOTAPREFSFILE.............").unwrap();

        let mut prefs = store(&dir);
        assert!(prefs.is_empty());
        prefs.set_int("score", 7);
        prefs.save().unwrap();

        let bytes = fs::read(&path).unwrap();
        assert_eq!(&bytes[..10], MAGIC);
        assert_eq!(store(&dir).get_int("score"), 7);
    }

    #[test]
    fn foreign_prefsid_is_treated_as_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PREFS_FILE);
        let mut other = Prefs::open("other", &path).unwrap();
        other.set_int("score", 1);
        other.save().unwrap();

        assert!(store(&dir).is_empty());
    }

    #[test]
    fn file_layout() {
        let dir = tempfile::tempdir().unwrap();
        let mut prefs = store(&dir);
        prefs.set_string("k", "vv");
        prefs.save().unwrap();

        let bytes = fs::read(prefs.path()).unwrap();
        let (header, entry) = bytes.split_at(24);
        assert_eq!(&header[..12], b"SURGEPREFS\0\0");
        assert_eq!(&header[12..16], surge_core::VERSION_CODE.to_le_bytes());
        assert_eq!(&header[16..20], hash_key("demo").to_le_bytes());
        assert_eq!(&header[20..24], 1u32.to_le_bytes());
        // string payloads carry no terminator
        assert_eq!(entry, [3, 4, 0, 0, 0, b'k', 0, b'v', b'v']);
    }

    #[test]
    fn unknown_types_load_as_null_and_bad_doubles_as_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PREFS_FILE);
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"SURGEPREFS\0\0");
        bytes.extend_from_slice(&surge_core::VERSION_CODE.to_le_bytes());
        bytes.extend_from_slice(&hash_key("demo").to_le_bytes());
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(&[9, 5, 0, 0, 0]);
        bytes.extend_from_slice(b"odd\0z");
        bytes.extend_from_slice(&[2, 4, 0, 0, 0]);
        bytes.extend_from_slice(b"f\0??");
        fs::write(&path, bytes).unwrap();

        let mut prefs = store(&dir);
        assert_eq!(prefs.item_type("odd"), Some(PrefsType::Null));
        assert_eq!(prefs.item_type("f"), Some(PrefsType::Float64));
        assert_eq!(prefs.get_double("f"), 0.0);
    }

    #[test]
    fn truncated_file_is_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let mut prefs = store(&dir);
        prefs.set_int("a", 1);
        prefs.set_int("b", 2);
        prefs.save().unwrap();

        let path = prefs.path().to_path_buf();
        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() - 2]).unwrap();
        assert!(store(&dir).is_empty());
    }
}
