//! Text and binary file handles
//!
//! A handle is a small `Copy` value naming a stream that an arena owns. The
//! arena closes every stream it still owns when it is destroyed, so a
//! function-local file is closed on return even if the program never calls
//! `close`. Returning a handle to a caller goes through `promote`, which
//! moves the stream into the caller's arena: exactly one arena ever closes
//! a given stream.
//!
//! I/O failures are ordinary `io::Result`s. Text read from a file is stored
//! in the handle's arena and lives as long as it.

use sn_core::{Arena, FileId, FileStream, TrackedFile};
use std::fs::OpenOptions;
use std::io::{self, Read};

/// Arena registration shared by both handle kinds
#[derive(Debug, Clone, Copy)]
struct Tracked<'a> {
    arena: &'a Arena<'a>,
    id: FileId,
    path: &'a str,
}

fn not_tracked(path: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{}: file is not tracked by this arena", path),
    )
}

impl<'a> Tracked<'a> {
    fn open(
        arena: &'a Arena<'a>,
        path: &str,
        options: &OpenOptions,
        is_text: bool,
    ) -> io::Result<Self> {
        let file = options.open(path)?;
        let id = arena.track_file(TrackedFile::new(file, path, is_text));
        Ok(Tracked {
            arena,
            id,
            path: arena.strdup(path),
        })
    }

    fn with_stream<R>(
        &self,
        f: impl FnOnce(&mut (dyn FileStream + 'static)) -> io::Result<R>,
    ) -> io::Result<R> {
        self.arena
            .with_file(self.id, |file| f(file.stream()?))
            .unwrap_or_else(|| Err(not_tracked(self.path)))
    }

    fn read_to_end(&self) -> io::Result<Vec<u8>> {
        self.with_stream(|s| {
            let mut buf = Vec::new();
            s.read_to_end(&mut buf)?;
            Ok(buf)
        })
    }

    fn write_all(&self, bytes: &[u8]) -> io::Result<()> {
        self.with_stream(|s| s.write_all(bytes))
    }

    fn flush(&self) -> io::Result<()> {
        self.with_stream(|s| s.flush())
    }

    fn close(&self) -> io::Result<()> {
        self.arena.close_file(self.id)
    }

    fn is_open(&self) -> bool {
        self.arena.is_file_open(self.id)
    }

    fn promote<'b>(&self, dest: &'b Arena<'b>) -> io::Result<Tracked<'b>> {
        let file = self
            .arena
            .untrack_file(self.id)
            .ok_or_else(|| not_tracked(self.path))?;
        Ok(Tracked {
            arena: dest,
            id: dest.track_file(file),
            path: dest.strdup(self.path),
        })
    }
}

fn read_options() -> OpenOptions {
    let mut options = OpenOptions::new();
    options.read(true);
    options
}

fn create_options() -> OpenOptions {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    options
}

fn append_options() -> OpenOptions {
    let mut options = OpenOptions::new();
    options.append(true).create(true);
    options
}

/// A UTF-8 text file owned by an arena
#[derive(Debug, Clone, Copy)]
pub struct TextFile<'a>(Tracked<'a>);

impl<'a> TextFile<'a> {
    /// Open an existing file for reading
    pub fn open(arena: &'a Arena<'a>, path: &str) -> io::Result<Self> {
        Tracked::open(arena, path, &read_options(), true).map(TextFile)
    }

    /// Create (or truncate) a file for writing
    pub fn create(arena: &'a Arena<'a>, path: &str) -> io::Result<Self> {
        Tracked::open(arena, path, &create_options(), true).map(TextFile)
    }

    pub fn append(arena: &'a Arena<'a>, path: &str) -> io::Result<Self> {
        Tracked::open(arena, path, &append_options(), true).map(TextFile)
    }

    /// Read everything from the current position to the end
    pub fn read_all(&self) -> io::Result<&'a str> {
        let bytes = self.0.read_to_end()?;
        let text = String::from_utf8(bytes)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(self.0.arena.strdup(&text))
    }

    /// Read one line without its terminator (`\n` or `\r\n`)
    ///
    /// Returns `None` at end of file. The stream is read byte by byte so
    /// that nothing past the line is consumed.
    pub fn read_line(&self) -> io::Result<Option<&'a str>> {
        let line = self.0.with_stream(|s| {
            let mut line = Vec::new();
            let mut byte = [0u8; 1];
            loop {
                match s.read(&mut byte) {
                    Ok(0) if line.is_empty() => return Ok(None),
                    Ok(0) => break,
                    Ok(_) if byte[0] == b'\n' => break,
                    Ok(_) => line.push(byte[0]),
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                }
            }
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            Ok(Some(line))
        })?;

        match line {
            None => Ok(None),
            Some(bytes) => {
                let text = String::from_utf8(bytes)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                Ok(Some(self.0.arena.strdup(&text)))
            }
        }
    }

    pub fn write_str(&self, text: &str) -> io::Result<()> {
        self.0.write_all(text.as_bytes())
    }

    pub fn write_line(&self, text: &str) -> io::Result<()> {
        self.0.with_stream(|s| {
            s.write_all(text.as_bytes())?;
            s.write_all(b"\n")
        })
    }

    pub fn flush(&self) -> io::Result<()> {
        self.0.flush()
    }

    /// Close now instead of at arena destruction. Closing twice is a no-op.
    pub fn close(&self) -> io::Result<()> {
        self.0.close()
    }

    pub fn is_open(&self) -> bool {
        self.0.is_open()
    }

    pub fn path(&self) -> &'a str {
        self.0.path
    }

    pub fn id(&self) -> FileId {
        self.0.id
    }

    /// Move the stream into `dest`; this handle is unusable afterwards
    pub fn promote<'b>(&self, dest: &'b Arena<'b>) -> io::Result<TextFile<'b>> {
        self.0.promote(dest).map(TextFile)
    }
}

/// A raw byte file owned by an arena
#[derive(Debug, Clone, Copy)]
pub struct BinaryFile<'a>(Tracked<'a>);

impl<'a> BinaryFile<'a> {
    pub fn open(arena: &'a Arena<'a>, path: &str) -> io::Result<Self> {
        Tracked::open(arena, path, &read_options(), false).map(BinaryFile)
    }

    pub fn create(arena: &'a Arena<'a>, path: &str) -> io::Result<Self> {
        Tracked::open(arena, path, &create_options(), false).map(BinaryFile)
    }

    pub fn append(arena: &'a Arena<'a>, path: &str) -> io::Result<Self> {
        Tracked::open(arena, path, &append_options(), false).map(BinaryFile)
    }

    pub fn read_all(&self) -> io::Result<&'a [u8]> {
        let bytes = self.0.read_to_end()?;
        Ok(self.0.arena.alloc_slice_copy(&bytes))
    }

    /// Read up to `count` bytes; fewer only at end of file
    pub fn read_bytes(&self, count: usize) -> io::Result<&'a [u8]> {
        let bytes = self.0.with_stream(|s| {
            let mut buf = Vec::with_capacity(count);
            s.take(count as u64).read_to_end(&mut buf)?;
            Ok(buf)
        })?;
        Ok(self.0.arena.alloc_slice_copy(&bytes))
    }

    pub fn write_bytes(&self, bytes: &[u8]) -> io::Result<()> {
        self.0.write_all(bytes)
    }

    pub fn flush(&self) -> io::Result<()> {
        self.0.flush()
    }

    pub fn close(&self) -> io::Result<()> {
        self.0.close()
    }

    pub fn is_open(&self) -> bool {
        self.0.is_open()
    }

    pub fn path(&self) -> &'a str {
        self.0.path
    }

    pub fn id(&self) -> FileId {
        self.0.id
    }

    pub fn promote<'b>(&self, dest: &'b Arena<'b>) -> io::Result<BinaryFile<'b>> {
        self.0.promote(dest).map(BinaryFile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(dir: &tempfile::TempDir, name: &str) -> String {
        dir.path().join(name).to_str().unwrap().to_string()
    }

    #[test]
    fn test_write_then_read_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "lines.txt");
        let arena = Arena::new();

        let out = TextFile::create(&arena, &path).unwrap();
        out.write_line("first").unwrap();
        out.write_str("second\r\nthird").unwrap();
        out.close().unwrap();
        assert!(!out.is_open());

        let input = TextFile::open(&arena, &path).unwrap();
        assert_eq!(input.read_line().unwrap(), Some("first"));
        assert_eq!(input.read_line().unwrap(), Some("second"));
        assert_eq!(input.read_line().unwrap(), Some("third"));
        assert_eq!(input.read_line().unwrap(), None);
        assert_eq!(input.path(), path);
    }

    #[test]
    fn test_read_all() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "all.txt");
        std::fs::write(&path, "héllo\nworld\n").unwrap();

        let arena = Arena::new();
        let file = TextFile::open(&arena, &path).unwrap();
        assert_eq!(file.read_all().unwrap(), "héllo\nworld\n");
        // At end of file now
        assert_eq!(file.read_all().unwrap(), "");
    }

    #[test]
    fn test_invalid_utf8_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "bad.txt");
        std::fs::write(&path, [0xff, 0xfe, b'\n']).unwrap();

        let arena = Arena::new();
        let file = TextFile::open(&arena, &path).unwrap();
        let err = file.read_line().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_open_missing_file() {
        let arena = Arena::new();
        assert!(TextFile::open(&arena, "/nonexistent/dir/file.txt").is_err());
        assert_eq!(arena.tracked_file_count(), 0);
    }

    #[test]
    fn test_io_after_close_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "closed.txt");
        let arena = Arena::new();

        let file = TextFile::create(&arena, &path).unwrap();
        file.close().unwrap();
        file.close().unwrap();
        assert!(file.write_str("late").is_err());
    }

    #[test]
    fn test_destroy_closes_open_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "owned.txt");
        let parent = Arena::new();

        {
            let child = parent.child();
            let file = TextFile::create(&child, &path).unwrap();
            file.write_line("written by child").unwrap();
            assert_eq!(child.tracked_file_count(), 1);
        }

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "written by child\n"
        );
    }

    #[test]
    fn test_promote_moves_ownership() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "promoted.txt");
        let parent = Arena::new();

        let promoted = {
            let child = parent.child();
            let file = TextFile::create(&child, &path).unwrap();
            file.write_str("a").unwrap();
            let promoted = file.promote(&parent).unwrap();
            assert_eq!(child.tracked_file_count(), 0);
            // The old handle no longer refers to anything
            assert!(!file.is_open());
            assert!(file.write_str("x").is_err());
            promoted
        };

        assert!(promoted.is_open());
        promoted.write_str("b").unwrap();
        promoted.close().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "ab");
        assert_eq!(promoted.path(), path);
    }

    #[test]
    fn test_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "log.txt");
        std::fs::write(&path, "one\n").unwrap();

        let arena = Arena::new();
        let file = TextFile::append(&arena, &path).unwrap();
        file.write_line("two").unwrap();
        file.flush().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn test_binary_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "data.bin");
        let arena = Arena::new();

        let out = BinaryFile::create(&arena, &path).unwrap();
        out.write_bytes(&[0, 1, 2, 0xff, 4]).unwrap();
        out.close().unwrap();

        let input = BinaryFile::open(&arena, &path).unwrap();
        assert_eq!(input.read_bytes(2).unwrap(), &[0, 1]);
        assert_eq!(input.read_bytes(10).unwrap(), &[2, 0xff, 4]);
        assert!(input.read_bytes(1).unwrap().is_empty());

        let again = BinaryFile::open(&arena, &path).unwrap();
        assert_eq!(again.read_all().unwrap(), &[0, 1, 2, 0xff, 4]);
        assert_ne!(again.id(), input.id());
    }

    #[test]
    fn test_binary_promote() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "moved.bin");
        let parent = Arena::new();

        let promoted = {
            let child = parent.child();
            BinaryFile::create(&child, &path)
                .unwrap()
                .promote(&parent)
                .unwrap()
        };
        promoted.write_bytes(b"ok").unwrap();
        assert_eq!(parent.tracked_file_count(), 1);
        drop(parent);
        assert_eq!(std::fs::read(&path).unwrap(), b"ok");
    }
}
