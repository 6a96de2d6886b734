use clap::Parser;
use std::path::PathBuf;

/// Define CLI arguments
#[derive(Parser)]
#[command(
    author = "hua0512 <https://github.com/hua0512>",
    version,
    about = "HLS (m3u8) video-on-demand downloader",
    long_about = "Downloads an HLS video-on-demand asset into a single file.\n\
                  \n\
                  The URL may point at a media playlist, a master playlist or a web page\n\
                  embedding an m3u8 link. Encrypted segments are decrypted, broken segment\n\
                  framing is repaired, and finished downloads are remembered so that running\n\
                  the same command again skips the work."
)]
pub struct CliArgs {
    /// Playlist or page URL
    #[arg(
        required_unless_present = "curl",
        help = "m3u8 playlist URL, or a page that embeds one"
    )]
    pub url: Option<String>,

    /// Import the request from a curl command line
    #[arg(
        long,
        value_name = "COMMAND",
        help = "Take URL, headers, proxy and TLS options from a browser's \"Copy as cURL\" command"
    )]
    pub curl: Option<String>,

    /// Print the request as a curl command and exit
    #[arg(long, help = "Print the resulting request as a curl command instead of downloading")]
    pub print_curl: bool,

    /// How relative segment URLs are resolved
    #[arg(
        long,
        default_value = "apiv1",
        help = "Host used for relative URLs: apiv1 (playlist directory) or apiv2 (scheme and host only)"
    )]
    pub host_type: String,

    /// Accept invalid TLS certificates
    #[arg(short = 'k', long, help = "Skip TLS certificate verification")]
    pub insecure: bool,

    /// Output directory
    #[arg(
        short,
        long,
        help = "Directory where the video will be saved (default: current directory)"
    )]
    pub output_dir: Option<PathBuf>,

    /// Output base name
    #[arg(
        short = 'n',
        long,
        help = "Output file name without extension (default: all)"
    )]
    pub name: Option<String>,

    /// Leading segments to drop
    #[arg(long, default_value = "0", help = "Number of segments to skip from the start")]
    pub skip: usize,

    /// Proxy URL
    #[arg(
        long,
        help = "Proxy URL, e.g. socks5://127.0.0.1:1080 or http://127.0.0.1:8080"
    )]
    pub proxy: Option<String>,

    /// Extra request headers
    #[arg(
        short = 'H',
        long = "header",
        help = "Add request header (format: 'Name: Value'), can be used multiple times"
    )]
    pub headers: Vec<String>,

    /// Parallel segment downloads
    #[arg(
        short = 'c',
        long,
        default_value = "8",
        help = "Number of segments downloaded in parallel"
    )]
    pub concurrency: usize,

    /// Attempts per segment
    #[arg(long, default_value = "5", help = "Attempts per segment before giving up")]
    pub retries: u32,

    /// Overall HTTP timeout in seconds
    #[arg(long, default_value = "10", help = "HTTP request timeout in seconds (0 disables it)")]
    pub timeout: u64,

    /// Connection timeout in seconds
    #[arg(long, default_value = "10", help = "HTTP connect timeout in seconds (0 disables it)")]
    pub connect_timeout: u64,

    /// Disable the progress bar
    #[arg(long, help = "Do not show a progress bar")]
    pub no_progress: bool,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable detailed debug logging")]
    pub verbose: bool,
}
