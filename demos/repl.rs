use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt};
use skeme::{parse_all, EvaluationContext, OutputPort, SchemeError};

async fn query(stdout: &mut io::Stdout, lines: &mut io::Lines<io::BufReader<io::Stdin>>, prompt: &str) -> io::Result<Option<String>> {
    stdout.write_all(prompt.as_bytes()).await?;
    stdout.flush().await?;
    lines.next_line().await
}

#[tokio::main]
async fn main() -> io::Result<()> {
    // Output is captured so it can be written through the async handle
    // alongside each result
    let mut context = EvaluationContext::with_output(OutputPort::captured());
    let mut lines = io::BufReader::new(io::stdin()).lines();
    let mut stdout = io::stdout();

    let mut buffer = String::new();
    loop {
        let prompt = if buffer.is_empty() { "scm> " } else { "...> " };
        let Some(line) = query(&mut stdout, &mut lines, prompt).await? else { break };
        buffer.push_str(&line);
        buffer.push('\n');

        let expressions = match parse_all(&buffer) {
            Err(SchemeError::UnexpectedEof) => continue,
            Err(error) => {
                stdout.write_all(format!("Error: {}\n", error).as_bytes()).await?;
                buffer.clear();
                continue;
            }
            Ok(expressions) => expressions,
        };
        buffer.clear();

        for expression in &expressions {
            let result = context.evaluate(expression);
            stdout.write_all(context.take_output().as_bytes()).await?;
            let text = match result {
                Ok(value) => format!("{}\n", value),
                Err(error) => format!("Error: {}\n", error),
            };
            stdout.write_all(text.as_bytes()).await?;
        }
    }

    stdout.write_all(b"\nBye.\n").await?;
    stdout.flush().await
}
