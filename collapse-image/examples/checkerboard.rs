use collapse_image::{generate_image, ModelOptions, Size, SolveOptions};
use image::{DynamicImage, Rgba, RgbaImage};

fn main() {
    let args = ::std::env::args().collect::<Vec<_>>();
    if args.len() != 2 {
        println!("usage: {} OUTPUT_PATH", args[0]);
        ::std::process::exit(1);
    }
    let output_path = &args[1];
    let mut input = RgbaImage::new(4, 4);
    for y in 0..4 {
        for x in 0..4 {
            let pixel = if (x + y) % 2 == 0 {
                Rgba([40, 40, 40, 255])
            } else {
                Rgba([220, 220, 220, 255])
            };
            input.put_pixel(x, y, pixel);
        }
    }
    let output_image = generate_image(
        &DynamicImage::ImageRgba8(input),
        2,
        Size::new(48, 48),
        ModelOptions::default(),
        &SolveOptions {
            seed: 0,
            max_restarts: 10,
            ..Default::default()
        },
    )
    .expect("too many contradictions");
    output_image.save(output_path).expect("failed to save");
}
