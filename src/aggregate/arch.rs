//! Recognition of buildsets that target a known architecture.

use std::sync::LazyLock;

use regex::Regex;

/// Known target architectures. Add new targets here.
pub const ARCHITECTURES: &[&str] = &[
    "aarch64",
    "arm",
    "bfin",
    "epiphany",
    "i386",
    "lm32",
    "m68k",
    "microblaze",
    "mips",
    "moxie",
    "nios2",
    "or1k",
    "powerpc",
    "riscv",
    "riscv32",
    "riscv64",
    "sh",
    "sparc",
    "sparc64",
    "v850",
    "x86_64",
];

/// `<digits>/rtems-<anything>`
static ARCH_BUILDSET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+/rtems-.+$").expect("valid buildset pattern"));

/// Architecture a buildset targets, if it is a recognized architecture build.
///
/// The buildset must look like `123/rtems-<...>`; after dropping a trailing
/// `.bset` it must end with a name from [`ARCHITECTURES`]. The longest
/// matching name wins, so `rtems-riscv64` is `riscv64` and not `riscv`.
///
/// # Examples
/// - `123/rtems-testsuite-arm` → `Some("arm")`
/// - `7/rtems-sparc64.bset` → `Some("sparc64")`
/// - `1/rtems-bash` → `Some("sh")`
/// - `45/rtems-build` → `None`
pub fn recognized_architecture(buildset: &str) -> Option<&'static str> {
    if !ARCH_BUILDSET.is_match(buildset) {
        return None;
    }
    let stem = buildset.strip_suffix(".bset").unwrap_or(buildset);
    ARCHITECTURES
        .iter()
        .filter(|arch| stem.ends_with(**arch))
        .max_by_key(|arch| arch.len())
        .copied()
}

pub fn is_recognized(buildset: &str) -> bool {
    recognized_architecture(buildset).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognized() {
        assert_eq!(recognized_architecture("123/rtems-testsuite-arm"), Some("arm"));
        assert_eq!(recognized_architecture("6/rtems-aarch64"), Some("aarch64"));
        assert_eq!(recognized_architecture("7/rtems-sparc64.bset"), Some("sparc64"));
        assert_eq!(recognized_architecture("8/rtems-x86_64"), Some("x86_64"));
        assert_eq!(recognized_architecture("9/rtems-riscv32"), Some("riscv32"));
        assert_eq!(recognized_architecture("10/rtems-sh"), Some("sh"));
    }

    #[test]
    fn test_suffix_match_needs_no_separator() {
        assert_eq!(recognized_architecture("1/rtems-bash"), Some("sh"));
        assert_eq!(recognized_architecture("2/rtems-testsuitearm.bset"), Some("arm"));
        assert_eq!(recognized_architecture("3/rtems-riscv64"), Some("riscv64"));
        assert_eq!(recognized_architecture("4/rtems-sparc64"), Some("sparc64"));
    }

    #[test]
    fn test_not_recognized() {
        assert_eq!(recognized_architecture("45/rtems-build"), None);
        assert_eq!(recognized_architecture("rtems-arm"), None);
        assert_eq!(recognized_architecture("x1/rtems-arm"), None);
        assert_eq!(recognized_architecture("1/gcc-arm"), None);
        assert_eq!(recognized_architecture("1/rtems-"), None);
    }

    #[test]
    fn test_table_is_sorted_and_unique() {
        let mut sorted = ARCHITECTURES.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted, ARCHITECTURES);
    }
}
