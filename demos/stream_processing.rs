// demos/stream_processing.rs
//! Double-buffered, memory-mapped input reader: streams a file byte by
//! byte across refills, plus a bulk whitespace scan.

use north_core::InputReader;
use std::env;
use std::io::Write;

fn main() {
    let path = env::args().nth(1);
    let (_tmp, path) = match path {
        Some(p) => (None, p),
        None => {
            let mut f = tempfile_demo_fixture();
            f.flush().unwrap();
            let path = f.path().to_string_lossy().into_owned();
            (Some(f), path)
        }
    };

    println!("=== Input Reader ===\n");
    let mut reader = InputReader::open(&path).expect("open/mmap failed");
    println!("File size: {} bytes", reader.file_size());
    println!("SIMD dispatch: {:?}", reader.simd_level());

    print!("Streamed bytes: ");
    let mut count = 0usize;
    while let Some(b) = reader.next_char() {
        print!("{}", b as char);
        count += 1;
    }
    println!("\nTotal bytes streamed: {count}");

    println!("\n=== process_buffer (whitespace scan) ===\n");
    let mut reader = InputReader::open(&path).expect("reopen failed");
    let positions = reader.process_buffer();
    println!("Space positions in the active buffer: {positions:?}");
}

fn tempfile_demo_fixture() -> tempfile::NamedTempFile {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(b"let x = 1 + 2;\nfn main() { }\n").unwrap();
    f
}
