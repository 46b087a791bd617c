// Copyright 2025 HyperZoekt Project
// Derived from sourcegraph/zoekt (https://github.com/sourcegraph/zoekt)
// Copyright 2016 Google Inc. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Trigram extraction used to prefilter candidate documents.
//!
//! Only runs of ASCII word bytes (`[a-z0-9_]` after lowercasing) produce
//! trigrams; everything else resets the window. Needles and documents go
//! through the same function, so every trigram of a needle occurs in any
//! document containing it. Any case variant of the needle shares its
//! trigrams too.

/// Extract lowercase ASCII trigrams from `hay`, in order, with repeats.
pub fn trigrams(hay: &[u8]) -> impl Iterator<Item = [u8; 3]> + '_ {
    TrigramIter {
        bytes: hay,
        i: 0,
        w: [0; 3],
        n: 0,
    }
}

struct TrigramIter<'a> {
    bytes: &'a [u8],
    i: usize,
    w: [u8; 3],
    n: usize,
}

impl<'a> Iterator for TrigramIter<'a> {
    type Item = [u8; 3];
    fn next(&mut self) -> Option<Self::Item> {
        while self.i < self.bytes.len() {
            let b = self.bytes[self.i].to_ascii_lowercase();
            self.i += 1;
            let is_word = b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_';
            if !is_word {
                self.n = 0;
                continue;
            }
            if self.n < 3 {
                self.w[self.n] = b;
                self.n += 1;
                if self.n < 3 {
                    continue;
                }
            } else {
                self.w = [self.w[1], self.w[2], b];
            }
            return Some(self.w);
        }
        None
    }
}

/// Sorted, deduplicated trigram set of `hay`.
pub fn trigram_set(hay: &[u8]) -> Vec<[u8; 3]> {
    let mut v: Vec<[u8; 3]> = trigrams(hay).collect();
    v.sort_unstable();
    v.dedup();
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_trigrams() {
        let v: Vec<[u8; 3]> = trigrams(b"Hello_Zoekt1").collect();
        assert!(v.contains(b"hel"));
        assert!(v.contains(b"_zo"));
        assert!(v.contains(b"kt1"));
    }

    #[test]
    fn punctuation_resets_window() {
        let v: Vec<[u8; 3]> = trigrams(b"ab.cd").collect();
        assert!(v.is_empty());
        let v: Vec<[u8; 3]> = trigrams(b"abc def").collect();
        assert_eq!(v, vec![*b"abc", *b"def"]);
    }

    #[test]
    fn needle_trigrams_are_subset_of_document_trigrams() {
        let doc = trigram_set(b"fn main() { println!(\"Zoekt rocks\"); }");
        for t in trigrams(b"ZOEKT ro") {
            assert!(doc.binary_search(&t).is_ok(), "missing {:?}", t);
        }
    }
}
