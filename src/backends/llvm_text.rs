//! Prints an [`IrModule`](crate::backends::ir::IrModule) as textual LLVM IR.
//!
//! Serves the `-display-llvm-ir` flag and produces the `.ll` artifact the
//! driver hands to the native tool chain.

use crate::backends::ir::{IrFunctionDef, IrInstr, IrModule};
use crate::backends::{BinOp, CastKind, CmpPred, IrConst, IrType, Linkage};
use std::fmt::Write;

pub fn print_module(module: &IrModule) -> String {
    let mut out = String::new();

    for (index, def) in module.structs.iter().enumerate() {
        let members = if def.members.is_empty() {
            "i8".to_string()
        } else {
            def.members
                .iter()
                .map(|m| type_name(module, m))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let _ = writeln!(out, "%{}.{} = type {{ {} }}", def.name, index, members);
    }
    if !module.structs.is_empty() {
        out.push('\n');
    }

    for def in &module.globals {
        let _ = writeln!(
            out,
            "@{} = global {} {}",
            def.name,
            type_name(module, &def.ty),
            const_value(module, &def.init),
        );
    }
    if !module.globals.is_empty() {
        out.push('\n');
    }

    for function in &module.functions {
        print_function(module, function, &mut out);
        out.push('\n');
    }

    out
}

fn print_function(module: &IrModule, function: &IrFunctionDef, out: &mut String) {
    let params = function
        .params
        .iter()
        .enumerate()
        .map(|(i, p)| format!("{} %arg{}", type_name(module, p), i))
        .collect::<Vec<_>>()
        .join(", ");

    if function.external {
        let convention = match function.linkage {
            Linkage::DllImport => " dllimport",
            Linkage::Export => "",
        };
        let _ = writeln!(
            out,
            "declare{} {} @{}({})",
            convention,
            type_name(module, &function.ret),
            function.name,
            params
        );
        return;
    }

    let _ = writeln!(
        out,
        "define {} @{}({}) {{",
        type_name(module, &function.ret),
        function.name,
        params
    );

    for (block_index, block) in function.blocks.iter().enumerate() {
        let _ = writeln!(out, "b{block_index}:");
        for &instr_id in &block.order {
            let _ = writeln!(
                out,
                "  {}",
                instr_text(module, function, instr_id as usize)
            );
        }
    }

    let _ = writeln!(out, "}}");
}

fn operand(function: &IrFunctionDef, module: &IrModule, value: u32) -> String {
    match &function.instrs[value as usize] {
        IrInstr::ConstInt { value, .. } => format!("{}", *value as i64),
        IrInstr::ConstFloat { value, .. } => format!("{value:e}"),
        IrInstr::ConstNull { .. } => "null".to_string(),
        IrInstr::Param { index } => format!("%arg{index}"),
        IrInstr::GlobalAddr { global } => {
            format!("@{}", module.globals[global.0 as usize].name)
        }
        _ => format!("%v{value}"),
    }
}

fn instr_text(module: &IrModule, function: &IrFunctionDef, id: usize) -> String {
    let op = |value: &crate::backends::ValueRef| operand(function, module, value.0);

    match &function.instrs[id] {
        IrInstr::Alloca { ty, count } => match count {
            Some(count) => format!(
                "%v{id} = alloca {}, i32 {}",
                type_name(module, ty),
                op(count)
            ),
            None => format!("%v{id} = alloca {}", type_name(module, ty)),
        },
        IrInstr::Load { ty, ptr } => {
            format!("%v{id} = load {}, ptr {}", type_name(module, ty), op(ptr))
        }
        IrInstr::Store { value, ptr } => format!("store {}, ptr {}", op(value), op(ptr)),
        IrInstr::Gep { elem_ty, ptr, index } => format!(
            "%v{id} = getelementptr {}, ptr {}, i32 {}",
            type_name(module, elem_ty),
            op(ptr),
            op(index)
        ),
        IrInstr::StructGep { strct, ptr, field } => format!(
            "%v{id} = getelementptr %{}.{}, ptr {}, i32 0, i32 {}",
            module.structs[strct.0 as usize].name, strct.0, op(ptr), field
        ),
        IrInstr::Memset { ptr, byte, len } => {
            format!("call void @llvm.memset(ptr {}, i8 {byte}, i32 {})", op(ptr), op(len))
        }
        IrInstr::Memcpy { dst, src, len } => format!(
            "call void @llvm.memcpy(ptr {}, ptr {}, i32 {})",
            op(dst),
            op(src),
            op(len)
        ),
        IrInstr::Bin { op: bin, lhs, rhs } => {
            format!("%v{id} = {} {}, {}", bin_name(*bin), op(lhs), op(rhs))
        }
        IrInstr::Cmp { pred, lhs, rhs } => {
            format!("%v{id} = {} {}, {}", cmp_name(*pred), op(lhs), op(rhs))
        }
        IrInstr::Cast { kind, to, value } => format!(
            "%v{id} = {} {} to {}",
            cast_name(*kind),
            op(value),
            type_name(module, to)
        ),
        IrInstr::Call { func, args } => {
            let callee = &module.functions[func.0 as usize];
            let args = args.iter().map(op).collect::<Vec<_>>().join(", ");
            if callee.ret == IrType::Void {
                format!("call void @{}({})", callee.name, args)
            } else {
                format!(
                    "%v{id} = call {} @{}({})",
                    type_name(module, &callee.ret),
                    callee.name,
                    args
                )
            }
        }
        IrInstr::Ret { value } => match value {
            Some(value) => format!("ret {}", op(value)),
            None => "ret void".to_string(),
        },
        IrInstr::Br { block } => format!("br label %b{}", block.0),
        IrInstr::CondBr {
            cond,
            then_block,
            else_block,
        } => format!(
            "br i1 {}, label %b{}, label %b{}",
            op(cond),
            then_block.0,
            else_block.0
        ),
        // Pure values only show up inline as operands
        IrInstr::ConstInt { .. }
        | IrInstr::ConstFloat { .. }
        | IrInstr::ConstNull { .. }
        | IrInstr::Param { .. }
        | IrInstr::GlobalAddr { .. } => String::new(),
    }
}

fn type_name(module: &IrModule, ty: &IrType) -> String {
    match ty {
        IrType::I1 => "i1".to_string(),
        IrType::I8 => "i8".to_string(),
        IrType::I16 => "i16".to_string(),
        IrType::I32 => "i32".to_string(),
        IrType::I64 => "i64".to_string(),
        IrType::F32 => "float".to_string(),
        IrType::F64 => "double".to_string(),
        IrType::Void => "void".to_string(),
        IrType::Ptr(_) => "ptr".to_string(),
        IrType::Struct(s) => format!("%{}.{}", module.structs[s.0 as usize].name, s.0),
    }
}

fn const_value(module: &IrModule, value: &IrConst) -> String {
    match value {
        IrConst::Zero(ty) if ty.is_float() => "0.0".to_string(),
        IrConst::Zero(IrType::Struct(_)) => "zeroinitializer".to_string(),
        IrConst::Zero(_) => "0".to_string(),
        IrConst::Int { value, .. } => format!("{}", *value as i64),
        IrConst::Float { value, .. } => format!("{value:e}"),
        IrConst::Null(_) => "null".to_string(),
        IrConst::Struct { fields, .. } => {
            let fields = fields
                .iter()
                .map(|f| const_value(module, f))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{{ {fields} }}")
        }
    }
}

fn bin_name(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "add",
        BinOp::Sub => "sub",
        BinOp::Mul => "mul",
        BinOp::SDiv => "sdiv",
        BinOp::UDiv => "udiv",
        BinOp::SRem => "srem",
        BinOp::URem => "urem",
        BinOp::And => "and",
        BinOp::Or => "or",
        BinOp::Xor => "xor",
        BinOp::Shl => "shl",
        BinOp::LShr => "lshr",
        BinOp::AShr => "ashr",
        BinOp::FAdd => "fadd",
        BinOp::FSub => "fsub",
        BinOp::FMul => "fmul",
        BinOp::FDiv => "fdiv",
    }
}

fn cmp_name(pred: CmpPred) -> &'static str {
    match pred {
        CmpPred::Eq => "icmp eq",
        CmpPred::Ne => "icmp ne",
        CmpPred::SLt => "icmp slt",
        CmpPred::SLe => "icmp sle",
        CmpPred::SGt => "icmp sgt",
        CmpPred::SGe => "icmp sge",
        CmpPred::ULt => "icmp ult",
        CmpPred::ULe => "icmp ule",
        CmpPred::UGt => "icmp ugt",
        CmpPred::UGe => "icmp uge",
        CmpPred::FEq => "fcmp oeq",
        CmpPred::FNe => "fcmp one",
        CmpPred::FLt => "fcmp olt",
        CmpPred::FLe => "fcmp ole",
        CmpPred::FGt => "fcmp ogt",
        CmpPred::FGe => "fcmp oge",
    }
}

fn cast_name(kind: CastKind) -> &'static str {
    match kind {
        CastKind::Trunc => "trunc",
        CastKind::ZExt => "zext",
        CastKind::SExt => "sext",
        CastKind::FpTrunc => "fptrunc",
        CastKind::FpExt => "fpext",
        CastKind::FpToSi => "fptosi",
        CastKind::FpToUi => "fptoui",
        CastKind::SiToFp => "sitofp",
        CastKind::UiToFp => "uitofp",
        CastKind::Bitcast => "bitcast",
        CastKind::PtrToInt => "ptrtoint",
        CastKind::IntToPtr => "inttoptr",
    }
}
