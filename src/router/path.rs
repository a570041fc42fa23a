//! Lexical URL path normalisation.
//!
//! [`clean_path`] is the URL counterpart of `std::path` normalisation, except
//! that it never touches the filesystem and never climbs above `/`. The
//! router runs it before a case-insensitive lookup so requests like
//! `/..//Foo/./bar` can be redirected to their canonical form.

/// Return the canonical form of `p`.
///
/// Applied iteratively until nothing changes:
///
/// 1. Replace multiple slashes with a single slash.
/// 2. Eliminate each `.` path name element (the current directory).
/// 3. Eliminate each inner `..` together with the non-`..` element before it.
/// 4. Eliminate `..` elements that begin a rooted path, i.e. replace `/..`
///    by `/` at the beginning of a path.
///
/// A trailing slash in the input is preserved, the result is always rooted,
/// and the empty string becomes `/`. The function is idempotent.
#[must_use]
pub fn clean_path(p: &str) -> String {
    if p.is_empty() {
        return "/".to_string();
    }

    let src = p.as_bytes();
    let n = src.len();
    // Room for a missing leading slash.
    let mut buf: Vec<u8> = Vec::with_capacity(n + 1);
    buf.push(b'/');

    // Invariants:
    //   reading from src; r is the index of the next byte to process.
    //   writing to buf; buf.len() is the index of the next byte to write.
    let mut r = if src[0] == b'/' { 1 } else { 0 };
    let mut trailing = n > 1 && src[n - 1] == b'/';

    while r < n {
        if src[r] == b'/' {
            // empty path element, trailing slash is added after the loop
            r += 1;
        } else if src[r] == b'.' && r + 1 == n {
            // final . element keeps the directory form
            trailing = true;
            r += 1;
        } else if src[r] == b'.' && src[r + 1] == b'/' {
            // . element
            r += 2;
        } else if src[r] == b'.'
            && src[r + 1] == b'.'
            && (r + 2 == n || src[r + 2] == b'/')
        {
            // .. element: remove to last /
            r += 2;
            if buf.len() > 1 {
                let mut w = buf.len() - 1;
                while w > 1 && buf[w] != b'/' {
                    w -= 1;
                }
                buf.truncate(w);
            }
        } else {
            // real path element, add slash if needed
            if buf.len() > 1 {
                buf.push(b'/');
            }
            while r < n && src[r] != b'/' {
                buf.push(src[r]);
                r += 1;
            }
        }
    }

    if trailing && buf.len() > 1 {
        buf.push(b'/');
    }

    // Only ASCII bytes were inserted or removed and whole elements were copied
    // verbatim, so the buffer is still valid UTF-8.
    String::from_utf8(buf)
        .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}
