//! Executes an [`IrModule`] directly.
//!
//! A small evaluator over the reference backend's instruction set: flat byte
//! memory, bump-allocated stack frames, and globals materialized up front.
//! The integration suite uses it to run whole compiled programs and observe
//! their exit codes without involving the native tool chain.

use crate::backends::ir::{IrFunctionDef, IrInstr, IrModule};
use crate::backends::{BinOp, CastKind, CmpPred, FuncRef, IrConst, IrType};

/// A runtime value. Pointers are addresses into the machine's flat memory.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Val {
    Int(u64),
    Float(f64),
    Ptr(u64),
}

impl Val {
    fn as_int(self) -> u64 {
        match self {
            Val::Int(v) => v,
            Val::Ptr(v) => v,
            Val::Float(v) => v as u64,
        }
    }

    fn as_float(self) -> f64 {
        match self {
            Val::Float(v) => v,
            Val::Int(v) => v as f64,
            Val::Ptr(v) => v as f64,
        }
    }
}

#[derive(Debug)]
pub enum ExecError {
    MissingFunction(String),
    ExternalCall(String),
    OutOfMemory,
    Unsupported(String),
}

pub struct Machine<'a> {
    module: &'a IrModule,
    memory: Vec<u8>,
    globals: Vec<u64>,
}

const MEMORY_LIMIT: usize = 64 * 1024 * 1024;

impl<'a> Machine<'a> {
    pub fn new(module: &'a IrModule) -> Result<Self, ExecError> {
        let mut machine = Machine {
            module,
            // Address zero stays unused so null pointers stay distinguishable
            memory: vec![0; 8],
            globals: Vec::new(),
        };

        for global in &module.globals {
            let size = module.size_of(&global.ty);
            let addr = machine.allocate(size as usize, module.align_of(&global.ty))?;
            machine.globals.push(addr);
            machine.write_const(addr, &global.init)?;
        }

        Ok(machine)
    }

    /// Runs `main` to completion and returns its value as a process exit
    /// code.
    pub fn run_main(&mut self) -> Result<i32, ExecError> {
        let main = self
            .module
            .find_function("main")
            .ok_or_else(|| ExecError::MissingFunction("main".to_string()))?;
        let result = self.call(main, Vec::new())?;
        Ok(result.map(|v| v.as_int() as i32).unwrap_or(0))
    }

    fn allocate(&mut self, size: usize, align: u32) -> Result<u64, ExecError> {
        let align = align.max(1) as usize;
        let addr = self.memory.len().div_ceil(align) * align;
        let end = addr + size.max(1);
        if end > MEMORY_LIMIT {
            return Err(ExecError::OutOfMemory);
        }
        self.memory.resize(end, 0);
        Ok(addr as u64)
    }

    fn write_const(&mut self, addr: u64, value: &IrConst) -> Result<(), ExecError> {
        match value {
            IrConst::Zero(_) | IrConst::Null(_) => Ok(()),
            IrConst::Int { ty, value } => {
                let size = self.module.size_of(ty);
                self.write_bytes(addr, *value, size);
                Ok(())
            }
            IrConst::Float { ty, value } => {
                match ty {
                    IrType::F32 => self.write_bytes(addr, (*value as f32).to_bits() as u64, 4),
                    _ => self.write_bytes(addr, value.to_bits(), 8),
                }
                Ok(())
            }
            IrConst::Struct { ty, fields } => {
                for (index, field) in fields.iter().enumerate() {
                    let offset = self.module.field_offset(*ty, index as u32);
                    self.write_const(addr + offset as u64, field)?;
                }
                Ok(())
            }
        }
    }

    fn write_bytes(&mut self, addr: u64, value: u64, size: u32) {
        let addr = addr as usize;
        let bytes = value.to_le_bytes();
        self.memory[addr..addr + size as usize].copy_from_slice(&bytes[..size as usize]);
    }

    fn read_bytes(&self, addr: u64, size: u32) -> u64 {
        let addr = addr as usize;
        let mut bytes = [0u8; 8];
        bytes[..size as usize].copy_from_slice(&self.memory[addr..addr + size as usize]);
        u64::from_le_bytes(bytes)
    }

    fn store_val(&mut self, addr: u64, value: Val, ty: &IrType) {
        match ty {
            IrType::F32 => self.write_bytes(addr, (value.as_float() as f32).to_bits() as u64, 4),
            IrType::F64 => self.write_bytes(addr, value.as_float().to_bits(), 8),
            _ => self.write_bytes(addr, value.as_int(), self.module.size_of(ty)),
        }
    }

    fn load_val(&self, addr: u64, ty: &IrType) -> Val {
        match ty {
            IrType::F32 => Val::Float(f32::from_bits(self.read_bytes(addr, 4) as u32) as f64),
            IrType::F64 => Val::Float(f64::from_bits(self.read_bytes(addr, 8))),
            IrType::Ptr(_) => Val::Ptr(self.read_bytes(addr, 8)),
            _ => Val::Int(self.read_bytes(addr, self.module.size_of(ty))),
        }
    }

    fn call(&mut self, func: FuncRef, args: Vec<Val>) -> Result<Option<Val>, ExecError> {
        let function = &self.module.functions[func.0 as usize];
        if function.external {
            return Err(ExecError::ExternalCall(function.name.clone()));
        }

        let frame_base = self.memory.len();
        let result = self.run_function(function, args);
        // Frames are bump allocated; everything past the base dies with it
        self.memory.truncate(frame_base.max(8));
        result
    }

    fn run_function(
        &mut self,
        function: &IrFunctionDef,
        args: Vec<Val>,
    ) -> Result<Option<Val>, ExecError> {
        let mut values: Vec<Option<Val>> = vec![None; function.instrs.len()];
        let mut block = 0usize;

        loop {
            let order = function.blocks[block].order.clone();
            let mut next_block = None;

            for instr_id in order {
                match self.step(function, instr_id, &args, &mut values)? {
                    Step::Continue => {}
                    Step::Jump(target) => {
                        next_block = Some(target);
                        break;
                    }
                    Step::Return(value) => return Ok(value),
                }
            }

            match next_block {
                Some(target) => block = target,
                // A block without a terminator falls off the function
                None => return Ok(None),
            }
        }
    }

    fn eval(
        &mut self,
        function: &IrFunctionDef,
        id: u32,
        args: &[Val],
        values: &mut [Option<Val>],
    ) -> Result<Val, ExecError> {
        if let Some(value) = values[id as usize] {
            return Ok(value);
        }

        let value = match &function.instrs[id as usize] {
            IrInstr::ConstInt { ty, value } => match ty {
                IrType::Ptr(_) => Val::Ptr(*value),
                _ => Val::Int(*value),
            },
            IrInstr::ConstFloat { value, .. } => Val::Float(*value),
            IrInstr::ConstNull { .. } => Val::Ptr(0),
            IrInstr::Param { index } => args[*index as usize],
            IrInstr::GlobalAddr { global } => Val::Ptr(self.globals[global.0 as usize]),
            other => {
                return Err(ExecError::Unsupported(format!(
                    "value %{id} used before executing {other:?}"
                )));
            }
        };

        values[id as usize] = Some(value);
        Ok(value)
    }

    fn step(
        &mut self,
        function: &IrFunctionDef,
        id: u32,
        args: &[Val],
        values: &mut Vec<Option<Val>>,
    ) -> Result<Step, ExecError> {
        macro_rules! operand {
            ($value:expr) => {
                self.eval(function, ($value).0, args, values)?
            };
        }

        let instr = function.instrs[id as usize].clone();
        let result = match instr {
            IrInstr::Alloca { ty, count } => {
                let count = match count {
                    Some(count) => operand!(count).as_int(),
                    None => 1,
                };
                let size = self.module.size_of(&ty) as usize * count as usize;
                let addr = self.allocate(size, self.module.align_of(&ty))?;
                Some(Val::Ptr(addr))
            }
            IrInstr::Load { ty, ptr } => {
                let addr = operand!(ptr).as_int();
                Some(self.load_val(addr, &ty))
            }
            IrInstr::Store { value, ptr } => {
                let stored = operand!(value);
                let addr = operand!(ptr).as_int();
                let ty = self.instr_value_type(function, value.0);
                self.store_val(addr, stored, &ty);
                None
            }
            IrInstr::Gep { elem_ty, ptr, index } => {
                let base = operand!(ptr).as_int();
                let index = operand!(index).as_int() as i64;
                let size = self.module.size_of(&elem_ty) as i64;
                Some(Val::Ptr((base as i64 + index * size) as u64))
            }
            IrInstr::StructGep { strct, ptr, field } => {
                let base = operand!(ptr).as_int();
                let offset = self.module.field_offset(strct, field) as u64;
                Some(Val::Ptr(base + offset))
            }
            IrInstr::Memset { ptr, byte, len } => {
                let addr = operand!(ptr).as_int() as usize;
                let len = operand!(len).as_int() as usize;
                self.memory[addr..addr + len].fill(byte);
                None
            }
            IrInstr::Memcpy { dst, src, len } => {
                let dst = operand!(dst).as_int() as usize;
                let src = operand!(src).as_int() as usize;
                let len = operand!(len).as_int() as usize;
                self.memory.copy_within(src..src + len, dst);
                None
            }
            IrInstr::Bin { op, lhs, rhs } => {
                let width = self.int_width_of(function, lhs.0);
                let lhs = operand!(lhs);
                let rhs = operand!(rhs);
                Some(apply_bin(op, lhs, rhs, width))
            }
            IrInstr::Cmp { pred, lhs, rhs } => {
                let width = self.int_width_of(function, lhs.0);
                let lhs = operand!(lhs);
                let rhs = operand!(rhs);
                Some(Val::Int(apply_cmp(pred, lhs, rhs, width) as u64))
            }
            IrInstr::Cast { kind, to, value } => {
                let width = self.int_width_of(function, value.0);
                let value = operand!(value);
                Some(apply_cast(self.module, kind, &to, value, width))
            }
            IrInstr::Call { func, args: call_args } => {
                let mut evaluated = Vec::with_capacity(call_args.len());
                for arg in &call_args {
                    evaluated.push(operand!(*arg));
                }
                self.call(func, evaluated)?
            }
            IrInstr::Ret { value } => {
                let value = match value {
                    Some(value) => Some(operand!(value)),
                    None => None,
                };
                return Ok(Step::Return(value));
            }
            IrInstr::Br { block } => return Ok(Step::Jump(block.0 as usize)),
            IrInstr::CondBr {
                cond,
                then_block,
                else_block,
            } => {
                let cond = operand!(cond).as_int();
                let target = if cond != 0 { then_block } else { else_block };
                return Ok(Step::Jump(target.0 as usize));
            }
            IrInstr::ConstInt { .. }
            | IrInstr::ConstFloat { .. }
            | IrInstr::ConstNull { .. }
            | IrInstr::Param { .. }
            | IrInstr::GlobalAddr { .. } => {
                return Err(ExecError::Unsupported(
                    "pure value scheduled in a block".to_string(),
                ));
            }
        };

        values[id as usize] = result;
        Ok(Step::Continue)
    }

    /// Bit width of an integer-typed value, for width-correct arithmetic.
    fn int_width_of(&self, function: &IrFunctionDef, id: u32) -> u32 {
        match self.instr_value_type(function, id) {
            IrType::I1 => 1,
            IrType::I8 => 8,
            IrType::I16 => 16,
            IrType::I32 => 32,
            _ => 64,
        }
    }

    /// Type a stored value was produced with, needed to pick the store width.
    fn instr_value_type(&self, function: &IrFunctionDef, id: u32) -> IrType {
        match &function.instrs[id as usize] {
            IrInstr::ConstInt { ty, .. }
            | IrInstr::ConstFloat { ty, .. }
            | IrInstr::ConstNull { ty }
            | IrInstr::Load { ty, .. } => ty.clone(),
            IrInstr::Cast { to, .. } => to.clone(),
            IrInstr::Alloca { ty, .. } => ty.clone().ptr_to(),
            IrInstr::Gep { elem_ty, .. } => elem_ty.clone().ptr_to(),
            IrInstr::StructGep { .. } | IrInstr::GlobalAddr { .. } => {
                IrType::Ptr(Box::new(IrType::I8))
            }
            IrInstr::Param { index } => function.params[*index as usize].clone(),
            IrInstr::Cmp { .. } => IrType::I1,
            IrInstr::Bin { lhs, .. } => self.instr_value_type(function, lhs.0),
            IrInstr::Call { func, .. } => self.module.functions[func.0 as usize].ret.clone(),
            _ => IrType::I64,
        }
    }
}

enum Step {
    Continue,
    Jump(usize),
    Return(Option<Val>),
}

/// Low `width` bits of a raw value, zero extended.
fn zx(value: u64, width: u32) -> u64 {
    if width >= 64 {
        value
    } else {
        value & ((1u64 << width) - 1)
    }
}

/// Low `width` bits of a raw value, sign extended.
fn sx(value: u64, width: u32) -> i64 {
    if width >= 64 {
        value as i64
    } else {
        let shift = 64 - width;
        ((value << shift) as i64) >> shift
    }
}

fn apply_bin(op: BinOp, lhs: Val, rhs: Val, width: u32) -> Val {
    use BinOp::*;
    let (l, r) = (lhs.as_int(), rhs.as_int());
    match op {
        Add => Val::Int(zx(l.wrapping_add(r), width)),
        Sub => Val::Int(zx(l.wrapping_sub(r), width)),
        Mul => Val::Int(zx(l.wrapping_mul(r), width)),
        SDiv => {
            let r = sx(r, width);
            let value = if r == 0 { 0 } else { sx(l, width).wrapping_div(r) };
            Val::Int(zx(value as u64, width))
        }
        UDiv => {
            let r = zx(r, width);
            Val::Int(if r == 0 { 0 } else { zx(l, width) / r })
        }
        SRem => {
            let r = sx(r, width);
            let value = if r == 0 { 0 } else { sx(l, width).wrapping_rem(r) };
            Val::Int(zx(value as u64, width))
        }
        URem => {
            let r = zx(r, width);
            Val::Int(if r == 0 { 0 } else { zx(l, width) % r })
        }
        And => Val::Int(zx(l & r, width)),
        Or => Val::Int(zx(l | r, width)),
        Xor => Val::Int(zx(l ^ r, width)),
        Shl => Val::Int(zx(l.wrapping_shl(r as u32), width)),
        LShr => Val::Int(zx(l, width).wrapping_shr(r as u32)),
        AShr => Val::Int(zx((sx(l, width).wrapping_shr(r as u32)) as u64, width)),
        FAdd => Val::Float(lhs.as_float() + rhs.as_float()),
        FSub => Val::Float(lhs.as_float() - rhs.as_float()),
        FMul => Val::Float(lhs.as_float() * rhs.as_float()),
        FDiv => Val::Float(lhs.as_float() / rhs.as_float()),
    }
}

fn apply_cmp(pred: CmpPred, lhs: Val, rhs: Val, width: u32) -> bool {
    use CmpPred::*;
    let (l, r) = (lhs.as_int(), rhs.as_int());
    match pred {
        Eq => zx(l, width) == zx(r, width),
        Ne => zx(l, width) != zx(r, width),
        SLt => sx(l, width) < sx(r, width),
        SLe => sx(l, width) <= sx(r, width),
        SGt => sx(l, width) > sx(r, width),
        SGe => sx(l, width) >= sx(r, width),
        ULt => zx(l, width) < zx(r, width),
        ULe => zx(l, width) <= zx(r, width),
        UGt => zx(l, width) > zx(r, width),
        UGe => zx(l, width) >= zx(r, width),
        FEq => lhs.as_float() == rhs.as_float(),
        FNe => lhs.as_float() != rhs.as_float(),
        FLt => lhs.as_float() < rhs.as_float(),
        FLe => lhs.as_float() <= rhs.as_float(),
        FGt => lhs.as_float() > rhs.as_float(),
        FGe => lhs.as_float() >= rhs.as_float(),
    }
}

fn apply_cast(module: &IrModule, kind: CastKind, to: &IrType, value: Val, src_width: u32) -> Val {
    match kind {
        CastKind::Trunc => {
            let size = module.size_of(to);
            Val::Int(zx(value.as_int(), size * 8))
        }
        CastKind::ZExt => Val::Int(zx(value.as_int(), src_width)),
        CastKind::SExt => {
            let size = module.size_of(to);
            Val::Int(zx(sx(value.as_int(), src_width) as u64, size * 8))
        }
        CastKind::FpTrunc => Val::Float(value.as_float() as f32 as f64),
        CastKind::FpExt => Val::Float(value.as_float()),
        CastKind::FpToSi => Val::Int((value.as_float() as i64) as u64),
        CastKind::FpToUi => Val::Int(value.as_float() as u64),
        CastKind::SiToFp => Val::Float(sx(value.as_int(), src_width) as f64),
        CastKind::UiToFp => Val::Float(zx(value.as_int(), src_width) as f64),
        CastKind::Bitcast | CastKind::IntToPtr => Val::Ptr(value.as_int()),
        CastKind::PtrToInt => Val::Int(value.as_int()),
    }
}
