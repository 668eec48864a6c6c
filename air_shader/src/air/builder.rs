//! Builder for textual AIR modules.
//!
//! AIR is an LLVM IR dialect; the module is assembled as text the same
//! way the engine's SPIR-V path assembles words. Output ordering is
//! fully deterministic: declarations and metadata are emitted in
//! insertion order, value names are sequential per function.

use std::collections::BTreeSet;
use std::fmt::Write;

/// An SSA value or constant rendered into the instruction stream.
pub type Value = String;

#[derive(Clone, Debug)]
pub struct ModuleBuilder {
    globals: Vec<String>,
    declarations: BTreeSet<String>,
    functions: Vec<String>,
    metadata_nodes: Vec<String>,
    named_metadata: Vec<(String, Vec<u32>)>,
}

impl ModuleBuilder {
    pub fn new() -> Self {
        Self {
            globals: Vec::new(),
            declarations: BTreeSet::new(),
            functions: Vec::new(),
            metadata_nodes: Vec::new(),
            named_metadata: Vec::new(),
        }
    }

    /// Adds a module-level global (threadgroup allocations and the
    /// like).
    pub fn global(&mut self, text: impl Into<String>) {
        self.globals.push(text.into());
    }

    /// Declares an external function; duplicates collapse.
    pub fn declare(&mut self, signature: impl Into<String>) {
        self.declarations.insert(signature.into());
    }

    /// Interns a metadata node and returns its `!N` id.
    pub fn metadata(&mut self, content: impl Into<String>) -> u32 {
        let content = content.into();
        let id = self.metadata_nodes.len() as u32;
        self.metadata_nodes.push(content);
        id
    }

    /// Appends nodes to a named metadata list, merging repeated names
    /// (several variants of one stage share the list).
    pub fn named_metadata(&mut self, name: impl Into<String>, nodes: Vec<u32>) {
        let name = name.into();
        if let Some((_, existing)) = self.named_metadata.iter_mut().find(|(n, _)| *n == name) {
            existing.extend(nodes);
        } else {
            self.named_metadata.push((name, nodes));
        }
    }

    pub fn push_function(&mut self, function: FunctionBuilder) {
        self.functions.push(function.finish());
    }

    pub fn build(self) -> String {
        let mut out = String::new();

        out.push_str("; ModuleID = 'dxbc2air'\n");
        out.push_str("source_filename = \"dxbc2air\"\n");
        out.push_str(
            "target datalayout = \"e-p:64:64:64-i1:8:8-i8:8:8-i16:16:16-i32:32:32-i64:64:64-f32:32:32-f64:64:64-v16:16:16-v24:32:32-v32:32:32-v48:64:64-v64:64:64-v96:128:128-v128:128:128-v192:256:256-v256:256:256-v512:512:512-v1024:1024:1024-n8:16:32\"\n",
        );
        out.push_str("target triple = \"air64-apple-macosx\"\n\n");

        for global in &self.globals {
            out.push_str(global);
            out.push('\n');
        }
        if !self.globals.is_empty() {
            out.push('\n');
        }

        for function in &self.functions {
            out.push_str(function);
            out.push('\n');
        }

        for declaration in &self.declarations {
            out.push_str(declaration);
            out.push('\n');
        }
        if !self.declarations.is_empty() {
            out.push('\n');
        }

        for (name, nodes) in &self.named_metadata {
            let refs: Vec<String> = nodes.iter().map(|n| format!("!{n}")).collect();
            let _ = writeln!(out, "{name} = !{{{}}}", refs.join(", "));
        }
        if !self.named_metadata.is_empty() {
            out.push('\n');
        }

        for (id, node) in self.metadata_nodes.iter().enumerate() {
            let _ = writeln!(out, "!{id} = {node}");
        }

        out
    }
}

impl Default for ModuleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
pub struct FunctionBuilder {
    name: String,
    ret_type: String,
    params: Vec<String>,
    attrs: String,
    blocks: Vec<(String, Vec<String>)>,
    current: usize,
    next_value: u32,
}

impl FunctionBuilder {
    pub fn new(name: impl Into<String>, ret_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ret_type: ret_type.into(),
            params: Vec::new(),
            attrs: String::new(),
            blocks: vec![("entry".into(), Vec::new())],
            current: 0,
            next_value: 0,
        }
    }

    pub fn param(&mut self, ty: impl Into<String>, name: impl Into<String>) -> Value {
        let name = name.into();
        self.params.push(format!("{} %{name}", ty.into()));
        format!("%{name}")
    }

    pub fn set_attrs(&mut self, attrs: impl Into<String>) {
        self.attrs = attrs.into();
    }

    /// Appends a labeled block and returns its index.
    pub fn add_block(&mut self, label: impl Into<String>) -> usize {
        self.blocks.push((label.into(), Vec::new()));
        self.blocks.len() - 1
    }

    pub fn select_block(&mut self, index: usize) {
        self.current = index;
    }

    pub fn block_label(&self, index: usize) -> &str {
        &self.blocks[index].0
    }

    fn fresh(&mut self) -> Value {
        let v = format!("%v{}", self.next_value);
        self.next_value += 1;
        v
    }

    /// Emits an instruction producing a value.
    pub fn emit(&mut self, rhs: impl Into<String>) -> Value {
        let value = self.fresh();
        let rhs = rhs.into();
        self.blocks[self.current].1.push(format!("  {value} = {rhs}"));
        value
    }

    /// Emits an instruction with no result (stores, calls to void,
    /// terminators).
    pub fn emit_void(&mut self, text: impl Into<String>) {
        self.blocks[self.current].1.push(format!("  {}", text.into()));
    }

    fn finish(self) -> String {
        let mut out = String::new();
        let attrs = if self.attrs.is_empty() {
            String::new()
        } else {
            format!(" {}", self.attrs)
        };
        let _ = writeln!(
            out,
            "define {} @{}({}){attrs} {{",
            self.ret_type,
            self.name,
            self.params.join(", ")
        );
        for (index, (label, instructions)) in self.blocks.iter().enumerate() {
            if index != 0 {
                let _ = writeln!(out, "{label}:");
            }
            for instruction in instructions {
                out.push_str(instruction);
                out.push('\n');
            }
        }
        out.push_str("}\n");
        out
    }
}

/// Renders an `f32` constant the way LLVM prints single-precision
/// floats (the 64-bit hex form).
pub fn float_constant(value: f32) -> String {
    let wide = value as f64;
    format!("0x{:016X}", wide.to_bits())
}

/// A `<4 x i32>` constant vector.
pub fn const_v4i32(values: [u32; 4]) -> String {
    format!(
        "<4 x i32> <i32 {}, i32 {}, i32 {}, i32 {}>",
        values[0] as i32, values[1] as i32, values[2] as i32, values[3] as i32
    )
}

#[cfg(test)]
mod tests {
    use super::{float_constant, FunctionBuilder, ModuleBuilder};

    #[test]
    fn module_layout_is_deterministic() {
        let build = || {
            let mut module = ModuleBuilder::new();
            module.declare("declare void @air.discard_fragment()");
            module.declare("declare float @air.fabs.f32(float)");
            let node = module.metadata("!{!\"air.vertex\"}");
            module.named_metadata("!air.functions", vec![node]);

            let mut function = FunctionBuilder::new("main", "void");
            function.param("<4 x float>", "in0");
            let v = function.emit("fadd float 1.0, 2.0");
            function.emit_void(format!("store float {v}, ptr null"));
            function.emit_void("ret void");
            module.push_function(function);
            module.build()
        };

        let a = build();
        let b = build();
        assert_eq!(a, b);
        assert!(a.contains("define void @main"));
        assert!(a.contains("!air.functions"));
    }

    #[test]
    fn float_constants_use_double_hex() {
        assert_eq!(float_constant(1.0), "0x3FF0000000000000");
        assert_eq!(float_constant(0.5), "0x3FE0000000000000");
    }

    #[test]
    fn blocks_are_labeled_in_insertion_order() {
        let mut function = FunctionBuilder::new("f", "void");
        let body = function.add_block("body");
        function.emit_void("br label %body");
        function.select_block(body);
        function.emit_void("ret void");

        let mut module = ModuleBuilder::new();
        module.push_function(function);
        let text = module.build();
        let entry_pos = text.find("br label %body").unwrap();
        let body_pos = text.find("body:").unwrap();
        assert!(entry_pos < body_pos);
    }
}
