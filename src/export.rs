//! Verilog export: describe a set of elements as synthesizable modules.
//!
//! Each element kind maps to one parameterized module. Exporting a circuit
//! writes every distinct module once, then one commented instantiation
//! line per element with its WIDTH/STAGES parameters.
//!
//! ```text
//! [&dyn Element] → export_verilog() → module Shifter ... / module SerialInput ...
//! ```

use std::io::Write;

use crate::element::{Element, ElementKind};
use crate::Result;

const SHIFTER_MODULE: &str = "\
module Shifter(out, inp, reset, shift_load, clk);
    parameter WIDTH = 1;
    parameter STAGES = 4;
    output reg [WIDTH*STAGES-1:0] out;
    input [WIDTH*STAGES-1:0] inp;
    input reset, shift_load, clk;

    always @ (posedge clk) begin
        if (reset)
            out <= 0;
        else if (shift_load)
            out <= inp;
        else
            out <= (out << WIDTH) | inp[WIDTH-1:0];
    end
endmodule
";

const SERIAL_INPUT_MODULE: &str = "\
module SerialInput(q, sin, clk);
    parameter WIDTH = 1;
    output reg [WIDTH-1:0] q;
    input clk;
    input [WIDTH-1:0] sin;

    always @ (posedge clk) begin
        q <= sin;
    end
endmodule
";

/// Module text for one element kind.
pub fn verilog_module(kind: ElementKind) -> &'static str {
    match kind {
        ElementKind::ShiftRegister => SHIFTER_MODULE,
        ElementKind::SerialInput => SERIAL_INPUT_MODULE,
    }
}

/// Write the modules needed by `elements`, then their instantiations.
pub fn export_verilog(elements: &[&dyn Element], writer: &mut dyn Write) -> Result<()> {
    // Header
    writeln!(writer, "// circuit-elements Verilog export")?;
    writeln!(writer, "// Elements: {}", elements.len())?;
    writeln!(writer)?;

    let mut kinds: Vec<ElementKind> = Vec::new();
    for element in elements {
        if !kinds.contains(&element.kind()) {
            kinds.push(element.kind());
        }
    }
    for kind in &kinds {
        writeln!(writer, "{}", verilog_module(*kind))?;
    }

    writeln!(writer, "// Instances")?;
    for element in elements {
        writeln!(
            writer,
            "// {} #({}) {}_{};",
            element.kind(),
            instance_parameters(*element),
            element.kind().object_type().to_lowercase(),
            element.id(),
        )?;
    }
    Ok(())
}

/// `.WIDTH(n)` plus any kind-specific parameters.
fn instance_parameters(element: &dyn Element) -> String {
    let mut params = vec![format!(".WIDTH({})", element.bit_width())];
    if element.kind() == ElementKind::ShiftRegister {
        if let Ok(stages) = element.snapshot().parameter::<usize>(2, "stage count") {
            params.push(format!(".STAGES({stages})"));
        }
    }
    params.join(", ")
}
