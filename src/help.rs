//! Help document served at `/help`.

use crate::keywords::KeywordSet;
use std::fmt::Write;

const HELP_INTRO: &str = r#"# IdentificaDoc - document validation with OCR

Checks that an uploaded document looks like the type you said it is
(CPF, CNH or RG) by reading its text with OCR and looking for known keywords.

## How it works

1. **Choose the type:** `cpf` (tax ID), `cnh` (driver's license) or `rg` (national ID).
2. **Upload:** a JPG, PNG or PDF file. For PDFs only the first page is read.
3. **Recognition:** the page is rendered at twice its size and passed to the OCR engine.
4. **Validation:** the text is uppercased and searched for each keyword of the chosen type.
5. **Result:** `FOUND` if at least one keyword appears, `NOT FOUND` otherwise.

The extracted text is never returned or stored. Only the verdict is.

## Usage

```sh
curl -F category=cpf -F "file=@cpf.png;type=image/png" http://127.0.0.1:9393/validate
```

The recognition engine loads once when the service starts. Uploads sent while it
is still loading are rejected with `NOT_READY`; send the file again once
`GET /status` no longer reports `loading_engine`.

## Keywords
"#;

const HELP_OUTRO: &str = r#"
Keywords can be replaced without rebuilding by starting the service with
`--keywords <file.json>`, where the file maps each type to its list:

```json
{ "cpf": ["CPF", "RECEITA FEDERAL"], "cnh": ["CNH", "DETRAN"], "rg": ["REGISTRO GERAL"] }
```
"#;

/// Render the help text with the keyword table currently in use.
pub fn render(keywords: &KeywordSet) -> String {
    let mut out = String::from(HELP_INTRO);
    out.push('\n');
    out.push_str("| Type | Keywords |\n|---|---|\n");
    for (category, words) in keywords.iter() {
        let _ = writeln!(
            out,
            "| {} (`{}`) | {} |",
            category.short_code(),
            category.as_str(),
            words.join(", ")
        );
    }
    out.push_str(HELP_OUTRO);
    out
}
