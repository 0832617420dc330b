use std::sync::Arc;

use kinesis_tail::prelude::*;
use tokio::io::{BufWriter, Stdout};

#[tokio::main]
async fn main() {
    let args = TailArgs::parse_normalized();
    init_logging(&args.log_filter);

    CliApp::new("kinesis-tail")
        .run(|stdout| tail_stream(args, stdout))
        .await
}

/// Main application logic - tails every shard and writes records to stdout
async fn tail_stream(args: TailArgs, stdout: BufWriter<Stdout>) -> Result<(), AppError> {
    // Bad flag values fail here, before any request is sent
    let config = args.tailer_config()?;

    let service =
        Arc::new(KinesisStreamService::connect(&args.region, args.endpoint_url.as_deref()).await);
    let mut writer = args.format.writer(stdout);

    let session = StreamTailer::new(service, config, args.policy())
        .start()
        .await?;

    // Only a failure ends the session
    let Err(error) = session.run(&mut writer).await;
    Err(error.into())
}
