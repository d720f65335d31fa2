//! Whole-pipeline scenarios, checked at the byte level rather than by
//! executing the emitted image (the crate never runs the toolchain it
//! targets during its own test suite).

fn compile(src: &str) -> nanocc::SectionTable {
    nanocc::compile("test.c", src.as_bytes()).expect("source should compile cleanly")
}

fn compile_err(src: &str) -> nanocc::Error {
    nanocc::compile("test.c", src.as_bytes()).expect_err("source should fail to compile")
}

#[test]
fn empty_main_compiles() {
    let sections = compile("int main() { return 0; }");
    assert!(!sections.text.is_empty());
}

#[test]
fn arithmetic_and_locals_round_trip() {
    let sections = compile(
        r#"
        int main() {
            int a;
            int b;
            a = 2;
            b = a + 3 * 4;
            return b;
        }
        "#,
    );
    assert!(!sections.text.is_empty());
}

#[test]
fn if_else_and_loops_compile() {
    let sections = compile(
        r#"
        int main() {
            int i;
            int total;
            total = 0;
            for (i = 0; i < 10; i = i + 1) {
                if (i == 5) {
                    continue;
                }
                if (i == 8) {
                    break;
                }
                total = total + i;
            }
            while (total > 100) {
                total = total - 1;
            }
            return total;
        }
        "#,
    );
    assert!(!sections.text.is_empty());
}

#[test]
fn function_calls_across_definitions() {
    let sections = compile(
        r#"
        int add(int a, int b) {
            return a + b;
        }
        int main() {
            return add(1, 2);
        }
        "#,
    );
    assert!(!sections.text.is_empty());
}

#[test]
fn forward_call_to_not_yet_defined_function_resolves() {
    // Exercises the fixed gfunc_call gap: `helper` is called before its
    // body is seen, so the call site must be patched once it is defined.
    let sections = compile(
        r#"
        int helper(int x);
        int main() {
            return helper(4);
        }
        int helper(int x) {
            return x + 1;
        }
        "#,
    );
    assert!(!sections.text.is_empty());
}

#[test]
fn compound_assignment_and_increment() {
    let sections = compile(
        r#"
        int main() {
            int x;
            x = 1;
            x += 4;
            x -= 1;
            x *= 2;
            x++;
            --x;
            return x;
        }
        "#,
    );
    assert!(!sections.text.is_empty());
}

#[test]
fn global_variable_read_and_write_compile() {
    let sections = compile(
        r#"
        int counter = 10;
        int total;
        int main() {
            counter = counter + 1;
            total = counter * 2;
            return total;
        }
        "#,
    );
    assert!(!sections.text.is_empty());
    assert!(!sections.data.is_empty());
}

#[test]
fn uninitialized_global_reserves_bss() {
    let sections = compile(
        r#"
        int accumulator;
        int main() {
            accumulator = 0;
            return accumulator;
        }
        "#,
    );
    assert!(sections.bss.len() > 0);
}

#[test]
fn syntax_error_reports_file_and_line() {
    let err = compile_err("int main() { return ; }");
    let message = err.to_string();
    assert!(message.contains("test.c"));
}

#[test]
fn float_literal_is_rejected() {
    let err = compile_err("int main() { return 1.5; }");
    assert!(err.to_string().contains("error"));
}

#[test]
fn compiled_image_has_pe_container() {
    let image = nanocc::compile_to_image("test.c", b"int main() { return 0; }")
        .expect("should compile to an image");
    assert_eq!(&image[0..2], b"MZ");
    assert_eq!(&image[0x80..0x84], b"PE\0\0");
    assert_eq!(image.len() % 0x200, 0);
}

#[test]
fn entry_point_targets_main_when_defined() {
    let (sections, entry, _fixups) =
        nanocc::compile_program("test.c", b"int main() { return 42; }").unwrap();
    assert!(!sections.text.is_empty());
    assert_eq!(entry, Some(0));
}

#[test]
fn entry_point_is_none_without_main() {
    let (_sections, entry, _fixups) =
        nanocc::compile_program("test.c", b"int helper() { return 1; }").unwrap();
    assert_eq!(entry, None);
}
