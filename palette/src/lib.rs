//! Palettes: Microsoft `RIFF` palettes, single `PPAL` palettes and the
//! multi-entry `PL98` tables with their shade, haze and blend lookups.
mod parser;
mod types;

pub use parser::{DATA, HEAD, INFO, PAL, PL98, PPAL, read_ms_palette};
pub use types::*;

#[cfg(test)]
mod test {
    use iff::{ByteStream, ByteWriter, RIFF};

    use super::*;

    fn colors(seed: u32) -> [u32; 256] {
        std::array::from_fn(|i| seed.wrapping_add(i as u32))
    }

    fn append_colors(writer: &mut ByteWriter, colors: &[u32]) {
        colors.iter().for_each(|&c| writer.append_u32(c));
    }

    fn pl98(weights: bool) -> Vec<u8> {
        let mut writer = ByteWriter::new();

        // raw size holds the entry count
        writer.append_u32(PL98);
        writer.append_u32(2);

        writer.append_i32(1); // shade shift
        writer.append_i32(1); // haze levels
        writer.append_i32(0x00ff00ff);
        writer.append_u8_slice(&[0xAA; 32]);

        append_colors(&mut writer, &colors(0x100));
        writer.append_i32(3);
        writer.append_u32(1);

        append_colors(&mut writer, &colors(0x200));
        writer.append_i32(9);
        writer.append_u32(0);

        let mut remap = vec![0u8; 5376 + 4608];
        remap[0] = 1; // shade
        remap[512] = 2; // haze
        remap[1024] = 3; // shade-haze color index
        remap[1280..1284].copy_from_slice(&0.5f32.to_le_bytes());
        remap[5376] = 4; // no-remap color index
        remap[5632 + 1024 * 3..5632 + 1024 * 3 + 4].copy_from_slice(&0.25f32.to_le_bytes());
        writer.append_u8_slice(&remap);

        writer.append_u8(weights as u8);
        if weights {
            (0..256).for_each(|i| writer.append_f32(i as f32));
            writer.append_u32(10);
            writer.append_u32(20);
        }

        writer.append_u32(0);
        writer.data
    }

    #[test]
    fn shade_haze_lookup_size() {
        let mut palette = Palette::open_from_bytes(&pl98(false)).unwrap();
        palette.shade_levels = 16;
        palette.haze_levels = 4;

        assert_eq!(
            palette.calc_lookup_size(PaletteKind::ShadeHaze),
            256 * 16 * 5 + (256 + 4 * 256 * 4)
        );
        assert_eq!(
            palette.calc_lookup_size(PaletteKind::Additive),
            65536 + BASE_LOOKUP_SIZE
        );
        assert_eq!(palette.calc_lookup_size(PaletteKind::ColorQuant), 0);
    }

    #[test]
    fn pl98_views() {
        let palette = Palette::open_from_bytes(&pl98(false)).unwrap();

        assert_eq!(palette.shade_levels, 2);
        assert_eq!(palette.haze_color, 0x00ff00ff);
        assert_eq!(palette.remap.len(), 5376 + 4608);
        assert_eq!(palette.entries.len(), 2);
        assert!(palette.color_weights.is_none());

        let shade_haze = &palette.entries[0];
        assert_eq!(shade_haze.kind, PaletteKind::ShadeHaze);
        assert_eq!(palette.shade_map(shade_haze).unwrap()[0], 1);
        assert_eq!(palette.shade_map(shade_haze).unwrap().len(), 512);
        assert_eq!(palette.haze_map(shade_haze).unwrap()[0], 2);
        assert_eq!(palette.color_index(shade_haze).unwrap()[0], 3);
        assert_eq!(palette.channel(shade_haze, Channel::R).unwrap()[0], 0.5);
        assert!(palette.trans_map(shade_haze).is_none());

        let plain = &palette.entries[1];
        assert_eq!(plain.kind, PaletteKind::NoRemap);
        assert!(palette.shade_map(plain).is_none());
        assert_eq!(palette.color_index(plain).unwrap()[0], 4);
        assert_eq!(palette.channel(plain, Channel::A).unwrap()[0], 0.25);
        assert_eq!(palette.channel(plain, Channel::A).unwrap().len(), 256);
    }

    #[test]
    fn pl98_weights() {
        let palette = Palette::open_from_bytes(&pl98(true)).unwrap();
        let weights = palette.color_weights.unwrap();

        assert_eq!(weights.weights[255], 255.);
        assert_eq!((weights.start, weights.end), (10, 20));
    }

    #[test]
    fn entry_fallback() {
        let palette = Palette::open_from_bytes(&pl98(false)).unwrap();

        assert_eq!(palette.entry_by_index(9).unwrap().index, 9);
        assert_eq!(palette.entry_by_index(77).unwrap().index, 3);
        assert_eq!(palette.entries[1].lookup_rgba(1), [0x01, 0x02, 0, 0]);
    }

    #[test]
    fn ppal_skips_info() {
        let mut writer = ByteWriter::new();
        let outer = writer.begin_chunk(PPAL);

        let head = writer.begin_chunk(HEAD);
        writer.append_u8(3);
        writer.append_u16(0);
        writer.append_u8(4);
        writer.end_chunk(head);

        let info = writer.begin_chunk(INFO);
        writer.append_u8_slice(b"made by hand");
        writer.end_chunk(info);

        let data = writer.begin_chunk(DATA);
        append_colors(&mut writer, &colors(7));
        writer.end_chunk(data);
        writer.end_chunk(outer);

        let palette = Palette::open_from_bytes(&writer.data).unwrap();

        assert_eq!(palette.shade_levels, 16);
        assert_eq!(palette.haze_levels, 0);
        assert_eq!(palette.entries[0].index, -1);
        assert_eq!(palette.entries[0].colors[255], 7 + 255);
    }

    #[test]
    fn ppal_rejects_unknown_version() {
        let mut writer = ByteWriter::new();
        let outer = writer.begin_chunk(PPAL);
        let head = writer.begin_chunk(HEAD);
        writer.append_u8(5);
        writer.append_u16(0);
        writer.append_u8(0);
        writer.end_chunk(head);
        writer.end_chunk(outer);

        assert!(matches!(
            Palette::open_from_bytes(&writer.data),
            Err(iff::DecodeError::UnsupportedVersion { version: 5, .. })
        ));
    }

    #[test]
    fn microsoft_palette() {
        let mut writer = ByteWriter::new();
        let riff = writer.begin_chunk(RIFF);
        writer.append_u32(PAL);
        let data = writer.begin_chunk(DATA);
        writer.append_u16(0x300);
        writer.append_u16(2);
        writer.append_u32(0x00332211);
        writer.append_u32(0x00665544);
        writer.end_chunk(data);
        writer.end_chunk(riff);

        let mut stream = ByteStream::new(&writer.data);
        let palette = Palette::read(&mut stream).unwrap();

        assert_eq!(palette.entries.len(), 1);
        assert_eq!(palette.entries[0].kind, PaletteKind::NoRemap);
        assert_eq!(palette.entries[0].lookup_rgb(1), [0x44, 0x55, 0x66]);
        assert_eq!(palette.entries[0].colors[2], 0);
    }

    #[test]
    fn decoding_is_repeatable() {
        let bytes = pl98(true);
        let copy = bytes.clone();

        let a = Palette::open_from_bytes(&bytes).unwrap();
        let b = Palette::open_from_bytes(&bytes).unwrap();

        assert_eq!(a, b);
        assert_eq!(bytes, copy);
    }
}
