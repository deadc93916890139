// demos/basic_usage.rs
//! Basic usage of the object pool, token allocator, and symbol table.

use north_core::token::{Delimiter, Ident, LitKind, LitValue, Literal, Span};
use north_core::{Pool, SymbolTable, TokenAllocator};

fn main() {
    println!("=== Generic Object Pool ===\n");

    let pool = Pool::new(64, 1024).unwrap();
    println!("Pool created: capacity={}, object_size={}", pool.capacity(), pool.object_size());

    let mut handles = Vec::new();
    for _ in 0..10 {
        handles.push(pool.alloc().unwrap());
    }
    println!("Allocated 10 slots; stats = {:?}", pool.stats());

    for h in handles {
        pool.free(h);
    }
    println!("Freed all 10; stats = {:?}\n", pool.stats());

    println!("=== Batch Allocation ===\n");
    let batch = pool.alloc_batch(200);
    println!("Batch-allocated {} slots", batch.len());
    pool.free_batch(&batch);
    pool.flush();
    println!("Batch freed and flushed; stats = {:?}\n", pool.stats());

    println!("=== Symbol Table ===\n");
    let symbols = SymbolTable::new();
    let fn_handle = symbols.intern(b"fn");
    let name_handle = symbols.intern(b"main");
    println!("'fn' -> {:?} (predefined={})", fn_handle, fn_handle.is_predefined());
    println!("'main' -> {:?} (interned={})\n", name_handle, name_handle.is_interned());

    println!("=== Token Allocator ===\n");
    let tokens = TokenAllocator::new();

    let open = tokens.alloc_delim(Span::new(0, 1), Delimiter::Paren, true).unwrap();
    let ident = tokens
        .alloc_ident(Span::new(1, 5), Ident { symbol: name_handle, is_raw: false })
        .unwrap();
    let lit = tokens
        .alloc_literal(
            Span::new(5, 7),
            Literal { kind: LitKind::Integer, value: LitValue::Int(42) },
        )
        .unwrap();
    let close = tokens.alloc_delim(Span::new(7, 8), Delimiter::Paren, false).unwrap();

    println!("Allocated 4 tokens; total_allocated = {}", tokens.total_allocated());

    for t in [open, ident, lit, close] {
        tokens.free(t);
    }
    println!("Freed all 4; total_allocated = {}", tokens.total_allocated());

    tokens.cleanup();
    println!("Cleaned up allocator.");
}
