//! Append-only string storage used to amortize small allocations when
//! interning shared-string text (§4.1).
//!
//! The original Go arena reinterprets a byte slice as a `string` via
//! `unsafe.Pointer`, relying on the backing slice staying alive for as long
//! as any returned string aliases it. Rust has no portable equivalent of
//! that trick, so this is the owned bump-allocator facade the spec allows:
//! chunks are retained in a `Vec`, and interned text is handed out as `Rc<str>`
//! clones so callers can hold a reference without borrowing the arena.

use std::rc::Rc;

const MIN_CHUNK: usize = 16 * 1024;

/// Bump allocator over `Rc<str>` chunks. Grows by replacing the active chunk
/// whenever the requested string would not fit in the remaining capacity.
pub struct Arena {
    chunks: Vec<String>,
}

impl Arena {
    pub fn new() -> Self {
        Arena { chunks: Vec::new() }
    }

    /// Intern `bytes` (already validated UTF-8 by the tokenizer) and return a
    /// reference-counted string slice stable for the arena's lifetime.
    pub fn intern(&mut self, bytes: &str) -> Rc<str> {
        let n = bytes.len();
        let needs_new_chunk = match self.chunks.last() {
            Some(chunk) => chunk.capacity() - chunk.len() < n,
            None => true,
        };
        if needs_new_chunk {
            self.chunks.push(String::with_capacity(MIN_CHUNK.max(n)));
        }
        let chunk = self.chunks.last_mut().expect("chunk just pushed");
        let start = chunk.len();
        chunk.push_str(bytes);
        Rc::from(&chunk[start..])
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interns_within_one_chunk() {
        let mut arena = Arena::new();
        let a = arena.intern("hello");
        let b = arena.intern("world");
        assert_eq!(&*a, "hello");
        assert_eq!(&*b, "world");
        assert_eq!(arena.chunks.len(), 1);
    }

    #[test]
    fn grows_a_new_chunk_when_the_current_one_is_full() {
        let mut arena = Arena::new();
        let big = "x".repeat(MIN_CHUNK);
        let first = arena.intern(&big);
        let second = arena.intern("tiny");
        assert_eq!(arena.chunks.len(), 2);
        assert_eq!(first.len(), MIN_CHUNK);
        assert_eq!(&*second, "tiny");
    }

    #[test]
    fn oversized_request_gets_its_own_chunk() {
        let mut arena = Arena::new();
        let huge = "y".repeat(MIN_CHUNK * 2 + 5);
        let interned = arena.intern(&huge);
        assert_eq!(interned.len(), huge.len());
    }

    #[test]
    fn earlier_strings_stay_valid_after_arena_grows() {
        let mut arena = Arena::new();
        let first = arena.intern("keep me");
        for _ in 0..4 {
            arena.intern(&"z".repeat(MIN_CHUNK));
        }
        assert_eq!(&*first, "keep me");
    }
}
