use std::io::{self, BufRead, Write};
use std::time::Duration;

use labelprinter::font::face_from_file;
use labelprinter::protocol::save_preview;
use labelprinter::{
    scan, BlockSurface, BleConnector, FontSurface, LabelGeometry, LabelPrinter, PrinterConfig,
    RasterSurface,
};

/// Example: print a text label
/// - Scans for BLE label printers
/// - Lets user select device
/// - Reads label text (empty line ends input), writes a preview, prints
///
/// Set LABEL_FONT to a .ttf/.otf path to render real glyphs; otherwise
/// characters are drawn as blocks.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("Scanning for label printers for 3 seconds...");
    let devices = scan(Duration::from_secs(3)).await?;
    if devices.is_empty() {
        println!("No devices found. Make sure Bluetooth is on and the printer is advertising.");
        return Ok(());
    }

    println!("Found devices:");
    for (i, d) in devices.iter().enumerate() {
        println!("  {}) id={} name={:?} rssi={:?}", i + 1, d.id, d.name, d.rssi);
    }

    let mut input = String::new();
    let chosen = loop {
        print!("Select device number to connect to (1-{}): ", devices.len());
        io::stdout().flush()?;
        input.clear();
        io::stdin().read_line(&mut input)?;
        if let Ok(n) = input.trim().parse::<usize>() {
            if n >= 1 && n <= devices.len() {
                break &devices[n - 1];
            }
        }
        println!("Invalid selection.");
    };

    println!("Enter label text, finish with an empty line:");
    let mut lines = Vec::new();
    for line in io::stdin().lock().lines() {
        let line = line?;
        if line.is_empty() {
            break;
        }
        lines.push(line);
    }
    let text = lines.join("\n");

    let config = PrinterConfig::default();
    let connector = BleConnector::device(chosen.id.clone(), Duration::from_secs(10));
    match std::env::var("LABEL_FONT") {
        Ok(path) => {
            let surface = FontSurface::new(LabelGeometry::D30, face_from_file(&path)?);
            run(surface, config, connector, &text).await
        }
        Err(_) => run(BlockSurface::new(LabelGeometry::D30), config, connector, &text).await,
    }
}

async fn run<S: RasterSurface>(
    surface: S,
    config: PrinterConfig,
    mut connector: BleConnector,
    text: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut printer = LabelPrinter::new(surface, config)?;

    let label = printer.render(text)?;
    save_preview(&label.bitmap, "label_preview.png")?;
    println!(
        "Preview written to label_preview.png (font {}px, {} bytes)",
        label.layout.font_size,
        label.frame.len()
    );

    println!("Sending print job...");
    match printer.print(text, &mut connector).await {
        Ok(report) => println!("Sent {} bytes in {} chunks.", report.bytes_sent, report.chunks),
        Err(e) => eprintln!("Print job failed: {}", e),
    }
    Ok(())
}
