use crate::{NoiseError, Result};

/// Parsed `internalField nonuniform List<vector>` data from a field file.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorField {
    /// Count declared on the line following the type.
    pub count: usize,
    /// The parsed 3-tuples, exactly `count` of them. Entries beyond the
    /// declared count are ignored.
    pub vectors: Vec<[f64; 3]>,
}

/// Extract the declared cell count and the per-cell vectors from a
/// `nonuniform List<vector>` internal field (the form `writeCellCentres`
/// produces).
pub fn parse_vector_field(text: &str) -> Result<VectorField> {
    let decl = text.find("internalField").ok_or_else(|| NoiseError::Parse {
        what: "no internalField declaration found".to_string(),
    })?;

    let mut pos = skip_ws(text, decl + "internalField".len());
    pos = eat(text, pos, "nonuniform").ok_or_else(|| NoiseError::Parse {
        what: "internalField is not 'nonuniform List<vector>'".to_string(),
    })?;
    pos = skip_ws(text, pos);
    pos = eat(text, pos, "List<vector>").ok_or_else(|| NoiseError::Parse {
        what: "internalField is not 'nonuniform List<vector>'".to_string(),
    })?;
    pos = skip_ws(text, pos);

    let digits_end = text[pos..]
        .find(|c: char| !c.is_ascii_digit())
        .map(|off| pos + off)
        .unwrap_or(text.len());
    let count: usize = text[pos..digits_end].parse().map_err(|_| NoiseError::Parse {
        what: "count line after List<vector> is not an integer".to_string(),
    })?;

    pos = skip_ws(text, digits_end);
    pos = eat(text, pos, "(").ok_or_else(|| NoiseError::Parse {
        what: "expected '(' after the vector count".to_string(),
    })?;

    let vectors = scan_vectors(&text[pos..], count);
    if vectors.len() < count {
        return Err(NoiseError::CountMismatch {
            expected: count,
            found: vectors.len(),
        });
    }

    Ok(VectorField { count, vectors })
}

/// Render `vectors` as a complete nonuniform internalField declaration,
/// terminated by `;` with no trailing newline so it can be spliced over an
/// existing declaration's span.
pub fn format_internal_field(vectors: &[[f64; 3]]) -> String {
    let mut out = String::with_capacity(40 * vectors.len() + 64);
    out.push_str("internalField   nonuniform List<vector>\n");
    out.push_str(&vectors.len().to_string());
    out.push_str("\n(\n");
    for v in vectors {
        out.push_str(&format!("({:.8e} {:.8e} {:.8e})\n", v[0], v[1], v[2]));
    }
    out.push_str(");");
    out
}

/// Replace the internalField declaration in `text` with `block`.
///
/// The primary scan anchors on the first `internalField` keyword and accepts
/// both the `uniform (x y z);` and the `nonuniform List<vector>` forms. If
/// that fails, a narrower fallback walks every `internalField` occurrence and
/// accepts only the uniform form, which recovers files where an earlier
/// occurrence of the keyword is not the declaration itself. Returns `None`
/// when neither scan matches.
pub fn replace_internal_field(text: &str, block: &str) -> Option<String> {
    replace_first_declaration(text, block).or_else(|| replace_any_uniform(text, block))
}

fn replace_first_declaration(text: &str, block: &str) -> Option<String> {
    let start = text.find("internalField")?;
    let end = declaration_end(text, start, true)?;
    Some(splice(text, start, end, block))
}

fn replace_any_uniform(text: &str, block: &str) -> Option<String> {
    for (start, _) in text.match_indices("internalField") {
        if let Some(end) = declaration_end(text, start, false) {
            return Some(splice(text, start, end, block));
        }
    }
    None
}

/// Byte offset one past the terminating `;` of the declaration starting at
/// `start`, or `None` when the text there does not match the expected form.
fn declaration_end(text: &str, start: usize, allow_nonuniform: bool) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut pos = skip_ws(text, start + "internalField".len());

    if let Some(after) = eat(text, pos, "uniform") {
        pos = skip_ws(text, after);
        if bytes.get(pos) != Some(&b'(') {
            return None;
        }
        let close = pos + text[pos..].find(')')?;
        let semi = skip_ws(text, close + 1);
        if bytes.get(semi) != Some(&b';') {
            return None;
        }
        return Some(semi + 1);
    }

    if !allow_nonuniform {
        return None;
    }

    pos = eat(text, pos, "nonuniform")?;
    pos = skip_ws(text, pos);
    pos = eat(text, pos, "List<vector>")?;
    pos = skip_ws(text, pos);

    let digits = pos;
    while matches!(bytes.get(pos), Some(b'0'..=b'9')) {
        pos += 1;
    }
    if pos == digits {
        return None;
    }

    pos = skip_ws(text, pos);
    if bytes.get(pos) != Some(&b'(') {
        return None;
    }
    let close = matching_paren(text, pos)?;
    let semi = skip_ws(text, close + 1);
    if bytes.get(semi) != Some(&b';') {
        return None;
    }
    Some(semi + 1)
}

/// Collect up to `limit` `(x y z)` tuples, skipping anything that does not
/// look like one. Entries may be separated by arbitrary whitespace.
fn scan_vectors(text: &str, limit: usize) -> Vec<[f64; 3]> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(limit);
    let mut pos = 0;
    while out.len() < limit && pos < bytes.len() {
        if bytes[pos] == b'(' {
            if let Some((vec, next)) = parse_tuple(text, pos) {
                out.push(vec);
                pos = next;
                continue;
            }
        }
        pos += 1;
    }
    out
}

fn parse_tuple(text: &str, open: usize) -> Option<([f64; 3], usize)> {
    let mut pos = skip_ws(text, open + 1);
    let mut vec = [0.0f64; 3];
    for slot in &mut vec {
        let (value, next) = parse_float(text, pos)?;
        *slot = value;
        pos = skip_ws(text, next);
    }
    if text.as_bytes().get(pos) == Some(&b')') {
        Some((vec, pos + 1))
    } else {
        None
    }
}

fn parse_float(text: &str, pos: usize) -> Option<(f64, usize)> {
    let bytes = text.as_bytes();
    let mut end = pos;
    while end < bytes.len() && matches!(bytes[end], b'0'..=b'9' | b'e' | b'E' | b'+' | b'-' | b'.') {
        end += 1;
    }
    if end == pos {
        return None;
    }
    text[pos..end].parse().ok().map(|value| (value, end))
}

fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (off, b) in text.as_bytes()[open..].iter().enumerate() {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + off);
                }
            }
            _ => {}
        }
    }
    None
}

fn skip_ws(text: &str, mut pos: usize) -> usize {
    let bytes = text.as_bytes();
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}

fn eat(text: &str, pos: usize, token: &str) -> Option<usize> {
    if text[pos..].starts_with(token) {
        Some(pos + token.len())
    } else {
        None
    }
}

fn splice(text: &str, start: usize, end: usize, block: &str) -> String {
    let mut out = String::with_capacity(text.len() - (end - start) + block.len());
    out.push_str(&text[..start]);
    out.push_str(block);
    out.push_str(&text[end..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NoiseError;

    const CENTRES: &str = "\
FoamFile
{
    version     2.0;
    format      ascii;
    class       volVectorField;
    object      C;
}

dimensions      [0 1 0 0 0 0 0];

internalField   nonuniform List<vector>
4
(
(0.05 0.05 0.05)
(0.15 0.05 0.05)
(0.25 0.05 0.05)
(0.35 0.05 0.05)
)
;

boundaryField
{
    walls
    {
        type    calculated;
        value   uniform (0 0 0);
    }
}
";

    const VELOCITY_UNIFORM: &str = "\
FoamFile
{
    version     2.0;
    format      ascii;
    class       volVectorField;
    object      U;
}

dimensions      [0 1 -1 0 0 0 0];

internalField   uniform (1 0 0);

boundaryField
{
    walls
    {
        type    noSlip;
    }
}
";

    #[test]
    fn parses_declared_count_and_vectors() {
        let field = parse_vector_field(CENTRES).unwrap();
        assert_eq!(field.count, 4);
        assert_eq!(field.vectors.len(), 4);
        assert_eq!(field.vectors[0], [0.05, 0.05, 0.05]);
        assert_eq!(field.vectors[3], [0.35, 0.05, 0.05]);
    }

    #[test]
    fn ignores_vectors_beyond_declared_count() {
        let text = "internalField   nonuniform List<vector>\n2\n(\n(1 2 3)\n(4 5 6)\n(7 8 9)\n)\n;\n";
        let field = parse_vector_field(text).unwrap();
        assert_eq!(field.count, 2);
        assert_eq!(field.vectors, vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
    }

    #[test]
    fn parses_scientific_notation_components() {
        let text = "internalField   nonuniform List<vector>\n1\n(\n(1.25e-3 -4.0E+2 0)\n)\n;\n";
        let field = parse_vector_field(text).unwrap();
        assert_eq!(field.vectors[0], [1.25e-3, -4.0e2, 0.0]);
    }

    #[test]
    fn rejects_uniform_cell_centres() {
        let err = parse_vector_field(VELOCITY_UNIFORM).unwrap_err();
        assert!(matches!(err, NoiseError::Parse { .. }));
    }

    #[test]
    fn rejects_missing_declaration() {
        let err = parse_vector_field("boundaryField\n{\n}\n").unwrap_err();
        assert!(matches!(err, NoiseError::Parse { .. }));
    }

    #[test]
    fn count_line_must_be_integer() {
        let text = "internalField   nonuniform List<vector>\nfour\n(\n)\n;\n";
        let err = parse_vector_field(text).unwrap_err();
        assert!(matches!(err, NoiseError::Parse { .. }));
    }

    #[test]
    fn fails_on_count_mismatch() {
        let text = "internalField nonuniform List<vector>\n4\n(\n(0 0 0)\n(1 0 0)\n(2 0 0)\n)\n;\n";
        let err = parse_vector_field(text).unwrap_err();
        match err {
            NoiseError::CountMismatch { expected, found } => {
                assert_eq!(expected, 4);
                assert_eq!(found, 3);
            }
            other => panic!("expected CountMismatch, got {other:?}"),
        }
    }

    #[test]
    fn replaces_uniform_declaration() {
        let block = format_internal_field(&[[1.0, 0.1, -0.1], [1.0, -0.1, 0.1]]);
        let out = replace_internal_field(VELOCITY_UNIFORM, &block).unwrap();
        assert!(!out.contains("uniform (1 0 0)"));
        assert!(out.contains("nonuniform List<vector>\n2\n("));
        // Header and boundary section survive untouched.
        assert!(out.contains("object      U;"));
        assert!(out.contains("type    noSlip;"));
    }

    #[test]
    fn replaces_nonuniform_declaration() {
        let block = format_internal_field(&[[1.0, 0.0, 0.0]]);
        let out = replace_internal_field(CENTRES, &block).unwrap();
        assert!(out.contains("nonuniform List<vector>\n1\n("));
        assert!(!out.contains("(0.25 0.05 0.05)"));
        assert!(out.contains("type    calculated;"));
    }

    #[test]
    fn fallback_recovers_uniform_after_decoy_keyword() {
        let text = "\
// internalField is rewritten below
internalField   uniform (0 0 0);
";
        let block = format_internal_field(&[[1.0, 0.0, 0.0]]);
        let out = replace_internal_field(text, &block).unwrap();
        assert!(out.contains("nonuniform List<vector>\n1\n("));
        assert!(out.starts_with("// internalField is rewritten below"));
    }

    #[test]
    fn reports_unmatched_declaration() {
        let text = "internalField   nonuniform List<scalar>\n2\n(\n0\n1\n)\n;\n";
        let block = format_internal_field(&[[1.0, 0.0, 0.0]]);
        assert!(replace_internal_field(text, &block).is_none());
    }

    #[test]
    fn formats_eight_digit_scientific() {
        let block = format_internal_field(&[[1.0, 0.0625, -0.5]]);
        assert!(block.contains("(1.00000000e0 6.25000000e-2 -5.00000000e-1)"));
        assert!(block.starts_with("internalField   nonuniform List<vector>\n1\n(\n"));
        assert!(block.ends_with(");"));
    }

    #[test]
    fn formatted_block_reparses_with_same_count() {
        let vectors = vec![[1.0, 0.5, -0.5]; 6];
        let block = format_internal_field(&vectors);
        let text = format!("{block}\n");
        let field = parse_vector_field(&text).unwrap();
        assert_eq!(field.count, 6);
        assert_eq!(field.vectors.len(), 6);
    }
}
