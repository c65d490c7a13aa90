//! The write step, behind a trait so tests can observe it.

use std::fs;
use std::io;
use std::path::Path;

/// Writes file contents, overwriting any existing file.
pub trait FileWriter: Send + Sync {
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;
}

/// Plain filesystem writer.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsWriter;

impl FileWriter for FsWriter {
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        fs::write(path, contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_is_byte_identical() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("blob.txt");
        let contents = "line one\r\nline two\u{2014}\ttabbed\n".as_bytes();
        FsWriter.write(&path, contents).expect("write");
        FsWriter.write(&path, contents).expect("overwrite");
        assert_eq!(fs::read(&path).expect("read"), contents);
    }
}
