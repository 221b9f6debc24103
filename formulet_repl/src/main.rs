use clap::Parser;
use codesnake::{Block, CodeWidth, Label, LineIndex};
use formulet::{compile, disassemble, evaluate, CompileError, VarSlot};
use yansi::Paint;

/// Compile and evaluate small integer formulas over `t`, `a`, `b`, `c`.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Formulas to compile and sweep over `t`; opens an interactive prompt
    /// when omitted.
    formulas: Vec<String>,

    /// Print the compiled bytecode listing of each formula.
    #[arg(long)]
    bytecode: bool,
}

/// Plenty for anything a prompt line can hold; the library itself works
/// with whatever buffer the caller brings.
const CODE_CAPACITY: usize = 256;

fn print_error(source: &str, error: CompileError) {
    // Zero-width spans (errors at end of input) don't label well, so point
    // at the whole character where possible and fall back to plain text.
    let end = source[error.offset..]
        .chars()
        .next()
        .map(|c| error.offset + c.len_utf8());
    let idx = LineIndex::new(source);
    let block = end.and_then(|end| {
        Block::new(
            &idx,
            [Label::new(error.offset..end).with_text(error.kind.red().to_string())],
        )
        .map(|block| block.map_code(|c| CodeWidth::new(c, c.len())))
    });
    match block {
        Some(block) => {
            println!("{}[formula]", block.prologue());
            print!("{block}");
            println!("{}", block.epilogue());
        }
        None => println!("{}", error.red()),
    }
}

fn sweep(source: &str, show_bytecode: bool) {
    println!("{}", source.bold());
    let mut code = [0u8; CODE_CAPACITY];
    match compile(source, &mut code) {
        Err(error) => print_error(source, error),
        Ok(len) => {
            if show_bytecode {
                print!("{}", disassemble(&code[..len]).dim());
            }
            for t in 0..10 {
                let mut vars = [0i32; VarSlot::COUNT];
                vars[VarSlot::T.index()] = t;
                let value = evaluate(&code[..len], &mut vars);
                println!("{t:>2}  {value:>11}");
            }
        }
    }
}

fn repl(show_bytecode: bool) -> anyhow::Result<()> {
    let mut readline = rustyline::DefaultEditor::new()?;
    // Variables persist across prompt lines, so an assignment formula can
    // set up the ones after it.
    let mut vars = [0i32; VarSlot::COUNT];

    while let Ok(input) = readline.readline(">> ") {
        let source = input.as_str();
        if source.trim().is_empty() {
            continue;
        }
        let _ = readline.add_history_entry(source);

        let mut code = [0u8; CODE_CAPACITY];
        match compile(source, &mut code) {
            Err(error) => print_error(source, error),
            Ok(len) => {
                if show_bytecode {
                    print!("{}", disassemble(&code[..len]).dim());
                }
                let value = evaluate(&code[..len], &mut vars);
                println!("{}", value.green());
                let state = vars
                    .iter()
                    .zip([VarSlot::T, VarSlot::A, VarSlot::B, VarSlot::C])
                    .map(|(value, slot)| format!("{}={value}", slot.name()))
                    .collect::<Vec<_>>()
                    .join(" ");
                println!("{}", state.dim());
            }
        }
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if cli.formulas.is_empty() {
        repl(cli.bytecode)
    } else {
        for formula in &cli.formulas {
            sweep(formula, cli.bytecode);
        }
        Ok(())
    }
}
