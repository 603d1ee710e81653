use mlpc::{ast::Type, compile, compile_file, error::Phase};
use std::fs;
use tempfile::tempdir;

const COUNTDOWN: &str = "\
// Cuenta regresiva con residuo
inteiro contador, par;
real media;

contador = 10;
media = 0.0;
enquanto (contador > 0)
    se ((contador RESTO 2) == 0) entao par = 1;
    senao par = 0;
contador = contador - 1;
media = (media + contador) / 2;
";

#[test]
fn accepted_program_end_to_end() {
    let compilation = compile("inteiro x;\nx = 5;\nse (x > 3) entao x = x + 1;", "exemplo.mlp");

    assert!(compilation.succeeded(), "{}", compilation.diagnostics);

    let symbols = compilation.symbols.as_ref().unwrap();
    assert_eq!(symbols.to_string(), "x : inteiro (linha 1, col 9)\n");

    let tac = compilation.tac.unwrap().to_string();
    let expected = "\
LOADI R1, 5
STORE x, R1
LOAD R2, x
LOADI R3, 3
CMPGT R2, R3
JMPFALSE R2, L1
LOAD R4, x
LOADI R5, 1
ADD R6, R4, R5
STORE x, R6
JMP L2
LABEL L1
LABEL L2
";

    assert_eq!(tac, expected);
}

#[test]
fn larger_program() {
    let compilation = compile(COUNTDOWN, "countdown.mlp");
    assert!(compilation.succeeded(), "{}", compilation.diagnostics);

    let symbols = compilation.symbols.unwrap();
    let types: Vec<_> = symbols.iter().map(|entry| entry.typ()).collect();
    assert_eq!(types, [Type::Integer, Type::Integer, Type::Real]);

    let tac = compilation.tac.unwrap();
    let opcodes: Vec<_> = tac.iter().map(|instruction| instruction.opcode()).collect();

    assert_eq!(opcodes.iter().filter(|&&op| op == "LABEL").count(), 4);
    assert_eq!(opcodes.iter().filter(|&&op| op == "STORE").count(), 6);
    assert!(opcodes.contains(&"CMPEQ"));
    assert!(!opcodes.contains(&"JMPTRUE"));
}

#[test]
fn every_semantic_code() {
    let source = "\
inteiro a, b, a, identificador;
caracter c;
real r;
a = 2147483648;
b = a RESTO 0;
c = 1;
b = b;
nada = 1;
r = a;
";

    let compilation = compile(source, "erros.mlp");
    assert!(compilation.tac.is_none());

    let codes = compilation.diagnostics.codes();
    let expected = [204, 202, 206, 205, 201, 209, 200, 208];
    assert_eq!(codes, expected);

    let rendered: Vec<_> = compilation
        .diagnostics
        .iter()
        .map(ToString::to_string)
        .collect();

    assert_eq!(
        rendered[0],
        "COD.204: erro semantico (linha 1, coluna 15): variável redeclarada [variável 'a' redeclarada]"
    );

    assert_eq!(
        rendered[3],
        "COD.205: erro semantico (linha 5, coluna 7): divisão por zero [divisão por zero]"
    );
}

#[test]
fn uninitialized_and_depth() {
    let mut source = String::from("inteiro x;\n");
    for _ in 0..12 {
        source.push_str("enquanto (x < 1)\n");
    }
    source.push_str("x = 1;\n");

    let compilation = compile(&source, "profundo.mlp");
    let positions: Vec<_> = compilation
        .diagnostics
        .iter()
        .map(|diagnostic| (diagnostic.code(), diagnostic.line(), diagnostic.column()))
        .collect();

    // Las lecturas anteriores al límite se reportan; el resto no se visita
    let mut expected: Vec<_> = (2..=11).map(|line| (207, line, 11)).collect();
    expected.push((203, 12, 1));

    assert_eq!(positions, expected);
}

#[test]
fn lexical_and_syntactic_phases() {
    let lexical = compile("inteiro x;\nx = 1 # 2;", "lex.mlp");
    assert!(lexical.diagnostics.has_phase(Phase::Lexical));
    assert_eq!(lexical.diagnostics.codes(), vec![1]);

    let syntactic = compile("inteiro x;\nse x > 1 entao x = 1;", "parse.mlp");
    assert!(syntactic.diagnostics.has_phase(Phase::Syntactic));
    assert!(!syntactic.diagnostics.has_phase(Phase::Semantic));
}

#[test]
fn pretty_report() {
    let compilation = compile("inteiro a;\na = 7 / 0;\n", "div.mlp");
    let report = compilation.diagnostics.to_string();

    assert!(report.starts_with("COD.205: erro semantico (linha 2, coluna 7)"));
    assert!(report.contains(" --> div.mlp:2:7\n"));
    assert!(report.contains("2 | a = 7 / 0;\n"));
    assert!(report.ends_with("Compilação falhou com 1 erro\n"));
}

#[test]
fn compiles_files() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("countdown.mlp");
    fs::write(&path, COUNTDOWN).unwrap();

    let from_file = compile_file(&path).unwrap();
    let in_memory = compile(COUNTDOWN, "countdown.mlp");

    assert!(from_file.succeeded());
    assert_eq!(from_file.tac, in_memory.tac);

    let missing = compile_file(dir.path().join("missing.mlp"));
    assert!(missing.is_err());
}

#[test]
fn tab_indented_columns() {
    let compilation = compile("inteiro x;\n\tx = y;", "tab.mlp");
    let positions: Vec<_> = compilation
        .diagnostics
        .iter()
        .map(|diagnostic| (diagnostic.code(), diagnostic.line(), diagnostic.column()))
        .collect();

    assert_eq!(positions, vec![(200, 2, 6), (201, 2, 2)]);
}
