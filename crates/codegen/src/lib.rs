// Bass - 8-bit Virtual CPU Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Emits assembled byte-code as source tables for embedding in host programs.

use anyhow::Result;
use proc_macro2::{Literal, TokenStream};
use quote::{format_ident, quote};

/// Bytes per instruction record.
const RECORD: usize = 3;
/// Hex bytes per line in C output (four records).
const C_BYTES_PER_LINE: usize = 12;

pub struct TableGenerator;

impl TableGenerator {
    /// `pub static NAME: [u8; N] = [...];`
    pub fn rust_static(name: &str, bytes: &[u8]) -> Result<String> {
        let ident = format_ident!("{}", Self::sanitize_name(name)?.to_uppercase());
        let len = Literal::usize_unsuffixed(bytes.len());
        let doc = format!(
            "Assembled program: {} instruction records.",
            bytes.len() / RECORD
        );
        let values: Vec<TokenStream> = bytes
            .iter()
            .map(|b| {
                let lit = Literal::u8_unsuffixed(*b);
                quote! { #lit }
            })
            .collect();

        let expanded = quote! {
            #[doc = #doc]
            pub static #ident: [u8; #len] = [#(#values),*];
        };

        Ok(expanded.to_string())
    }

    /// A `const uint8_t` array plus a length constant.
    pub fn c_array(name: &str, bytes: &[u8]) -> Result<String> {
        let name = Self::sanitize_name(name)?;
        let mut out = format!("const uint8_t {}[{}] = {{\n", name, bytes.len());
        for chunk in bytes.chunks(C_BYTES_PER_LINE) {
            let line: Vec<String> = chunk.iter().map(|b| format!("0x{:02x}", b)).collect();
            out.push_str("    ");
            out.push_str(&line.join(", "));
            out.push_str(",\n");
        }
        out.push_str("};\n");
        out.push_str(&format!(
            "const unsigned int {}_len = {};\n",
            name,
            bytes.len()
        ));
        Ok(out)
    }

    /// One instruction record per line, lowercase hex.
    pub fn hex_listing(bytes: &[u8]) -> String {
        let mut out = String::new();
        for record in bytes.chunks(RECORD) {
            let line: Vec<String> = record.iter().map(|b| format!("{:02x}", b)).collect();
            out.push_str(&line.join(" "));
            out.push('\n');
        }
        out
    }

    /// Maps an arbitrary label (e.g. a file stem) onto a C/Rust identifier.
    fn sanitize_name(name: &str) -> Result<String> {
        let mut ident: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        if ident.is_empty() || ident.chars().all(|c| c == '_') {
            anyhow::bail!("Cannot derive an identifier from table name '{}'", name);
        }
        if ident.starts_with(|c: char| c.is_ascii_digit()) {
            ident.insert(0, '_');
        }
        Ok(ident)
    }
}
