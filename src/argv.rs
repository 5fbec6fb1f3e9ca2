//! Lays out a host argv/envp as MINIX's "prix-fixe" argument block in
//! emulated RAM.
//!
//! Grounded on `MINIXCompat_Arguments_Initialize` in
//! `MINIXCompat_Processes.c`; the byte-buffer-building style (build a
//! `Vec<u8>` with NUL-terminated entries, track an offset) mirrors
//! `alloc_env_var` in the teacher's `shims/env.rs`.

/// Prefix that marks an envp entry for forwarding to the guest. Stripped
/// before the guest ever sees it.
const MINIX_ENV_PREFIX: &str = "MINIX_";

fn round_up_to_4(n: u32) -> u32 {
    (n + 3) & !3
}

/// The marshalled region, ready to be copied into emulated RAM at
/// `stack_base` as two contiguous blocks.
pub struct MarshalledArgs {
    /// argc (BE) + argv pointers + NULL + envp pointers + NULL, all BE u32.
    pub pointer_block: Vec<u8>,
    /// The NUL-terminated string bytes the pointer block points into.
    pub content_block: Vec<u8>,
}

impl MarshalledArgs {
    pub fn total_len(&self) -> usize {
        self.pointer_block.len() + self.content_block.len()
    }
}

/// Build the MINIX argument block for `argv`/`envp` at `stack_base`.
///
/// Envp entries are filtered to those with the `MINIX_` prefix, which is
/// then stripped — the guest sees `KEY=VALUE`, never `MINIX_KEY=VALUE`
/// (spec §4.11, invariant 9).
pub fn marshal(stack_base: u32, argv: &[&str], envp: &[&str]) -> MarshalledArgs {
    let forwarded: Vec<&str> = envp
        .iter()
        .filter_map(|e| e.strip_prefix(MINIX_ENV_PREFIX))
        .collect();

    let pointer_count = 1 + (argv.len() + 1) + (forwarded.len() + 1);
    let pointer_block_len = pointer_count * 4;

    let mut content_block = Vec::new();
    let mut pointers = Vec::with_capacity(pointer_count);

    pointers.extend_from_slice(&(argv.len() as u32).to_be_bytes());

    for s in argv {
        push_entry(&mut pointers, &mut content_block, stack_base, pointer_block_len as u32, s);
    }
    pointers.extend_from_slice(&0u32.to_be_bytes());

    for s in &forwarded {
        push_entry(&mut pointers, &mut content_block, stack_base, pointer_block_len as u32, s);
    }
    pointers.extend_from_slice(&0u32.to_be_bytes());

    MarshalledArgs { pointer_block: pointers, content_block }
}

/// Append `s`'s NUL-terminated bytes to `content`, 4-byte-aligning the next
/// entry, and push the corresponding big-endian absolute pointer onto
/// `pointers`.
fn push_entry(pointers: &mut Vec<u8>, content: &mut Vec<u8>, stack_base: u32, pointer_block_len: u32, s: &str) {
    let content_offset = content.len() as u32;
    let addr = stack_base + pointer_block_len + content_offset;
    pointers.extend_from_slice(&addr.to_be_bytes());

    content.extend_from_slice(s.as_bytes());
    content.push(0);
    let padded_len = round_up_to_4((s.len() + 1) as u32);
    content.resize(content_offset as usize + padded_len as usize, 0);
}

#[cfg(test)]
mod tests {
    use super::*;

    const STACK_BASE: u32 = 0x0010_0000;

    fn read_be_u32(buf: &[u8], offset: usize) -> u32 {
        u32::from_be_bytes(buf[offset..offset + 4].try_into().unwrap())
    }

    fn read_c_str<'a>(buf: &'a [u8], offset: usize) -> &'a str {
        let end = buf[offset..].iter().position(|&b| b == 0).unwrap();
        std::str::from_utf8(&buf[offset..offset + end]).unwrap()
    }

    #[test]
    fn round_up_examples() {
        assert_eq!(round_up_to_4(0), 0);
        assert_eq!(round_up_to_4(1), 4);
        assert_eq!(round_up_to_4(4), 4);
        assert_eq!(round_up_to_4(5), 8);
    }

    #[test]
    fn layout_matches_prix_fixe_stack_shape() {
        let args = marshal(STACK_BASE, &["prog", "a"], &["PATH=/", "MINIX_HOME=/u"]);

        // argc
        assert_eq!(read_be_u32(&args.pointer_block, 0), 2);

        // argv[0], argv[1], NULL
        let argv0_ptr = read_be_u32(&args.pointer_block, 4);
        let argv1_ptr = read_be_u32(&args.pointer_block, 8);
        let argv_null = read_be_u32(&args.pointer_block, 12);
        assert_eq!(argv_null, 0);

        // one envp pointer (only MINIX_HOME survives, stripped) then NULL
        let envp0_ptr = read_be_u32(&args.pointer_block, 16);
        let envp_null = read_be_u32(&args.pointer_block, 20);
        assert_eq!(envp_null, 0);
        assert_eq!(args.pointer_block.len(), 24);

        let base = STACK_BASE + args.pointer_block.len() as u32;
        assert_eq!(read_c_str(&args.content_block, (argv0_ptr - base) as usize), "prog");
        assert_eq!(read_c_str(&args.content_block, (argv1_ptr - base) as usize), "a");
        assert_eq!(read_c_str(&args.content_block, (envp0_ptr - base) as usize), "HOME=/u");
    }

    #[test]
    fn non_minix_envp_is_dropped_entirely() {
        let args = marshal(STACK_BASE, &["prog"], &["PATH=/", "SHELL=/bin/sh"]);
        // argc, argv[0], NULL, NULL(envp) = 4 pointer slots
        assert_eq!(args.pointer_block.len(), 16);
        let envp_null = read_be_u32(&args.pointer_block, 12);
        assert_eq!(envp_null, 0);
    }

    #[test]
    fn pointers_never_contain_minix_prefix() {
        let args = marshal(STACK_BASE, &[], &["MINIX_FOO=bar"]);
        assert!(!args.content_block.starts_with(b"MINIX_"));
        assert!(args.content_block.starts_with(b"FOO=bar"));
    }

    #[test]
    fn content_entries_are_4_byte_aligned() {
        let args = marshal(STACK_BASE, &["a", "bb", "ccc"], &[]);
        // Each entry's start offset (mod 4) must be 0.
        let base = STACK_BASE + args.pointer_block.len() as u32;
        for i in 0..3u32 {
            let ptr = read_be_u32(&args.pointer_block, 4 + (i as usize) * 4);
            assert_eq!((ptr - base) % 4, 0);
        }
    }
}
