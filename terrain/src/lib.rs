//! Terrain blocks (`GBLK`) and the block grids (`GFIL`) that lay them out.
mod parser;
mod types;

pub use parser::{GBLK, GFIL, LATEST_BLOCK_LIST_VERSION, LATEST_BLOCK_VERSION};
pub use types::*;

#[cfg(test)]
mod test {
    use iff::{ByteWriter, DecodeError};

    use super::*;

    fn block_header(writer: &mut ByteWriter, version: u32, light_scale: u32) -> usize {
        let start = writer.begin_chunk(GBLK);

        writer.append_u32(version);
        writer.append_fixed_string("block0", 16);
        writer.append_u32(4); // details
        writer.append_u32(light_scale);
        writer.append_i32(2);
        writer.append_i32(1);

        start
    }

    fn raw_tables(writer: &mut ByteWriter, light_scale: u32) {
        for cell in [[1u8, 2], [3, 4]] {
            writer.append_u8_slice(&cell);
        }

        let size = (2 << light_scale) + 1;
        (0..size * size).for_each(|i| writer.append_u16(i as u16));
    }

    fn lzh_block(writer: &mut ByteWriter, data: &[u8]) {
        let packed = lzh::pack::pack(data, 4096);

        writer.append_u32(data.len() as u32);
        writer.append_u32(packed.len() as u32);
        writer.append_u8_slice(&packed);
    }

    const HEIGHTS: [f32; 6] = [10., 12., 20., 0., -3., -1.];

    fn height_bytes() -> Vec<u8> {
        HEIGHTS.iter().flat_map(|h| h.to_le_bytes()).collect()
    }

    #[test]
    fn flat_heights() {
        let mut writer = ByteWriter::new();
        let start = block_header(&mut writer, 1, 0);
        HEIGHTS.iter().for_each(|&h| writer.append_f32(h));
        raw_tables(&mut writer, 0);
        writer.end_chunk(start);

        let block = TerrainBlock::open_from_bytes(&writer.data).unwrap();

        assert_eq!(block.name, "block0");
        assert_eq!(block.detail_count, 4);
        assert_eq!(block.heights, HEIGHTS.to_vec());
        assert_eq!(block.height(2, 0), Some(20.));
        assert_eq!(block.height(1, 1), Some(-3.));
        assert_eq!(block.height(3, 0), None);
        assert_eq!(block.height_range(), Some((-3., 20.)));
        assert_eq!(block.material(1, 0), Some(MaterialCell { flags: 3, index: 4 }));
        assert_eq!(block.material(2, 0), None);
        assert_eq!(block.light_map_size(), 3);
        assert_eq!(block.light(2, 2), Some(8));
        assert_eq!(block.light(3, 0), None);
    }

    #[test]
    fn row_delta_heights() {
        let mut writer = ByteWriter::new();
        let start = block_header(&mut writer, 2, 1);

        for (scale, first, last, delta) in [(0.5, 10., 20., 4i8), (1., 0., -1., -3)] {
            writer.append_f32(scale);
            writer.append_f32(first);
            writer.append_f32(last);
            writer.append_i8(delta);
        }

        raw_tables(&mut writer, 1);
        writer.end_chunk(start);

        let block = TerrainBlock::open_from_bytes(&writer.data).unwrap();

        assert_eq!(block.heights, HEIGHTS.to_vec());
        assert_eq!(block.light_map_size(), 5);
        assert_eq!(block.light_map.len(), 25);
        assert_eq!(block.light(4, 4), Some(24));
    }

    #[test]
    fn compressed_tables() {
        let mut writer = ByteWriter::new();
        let start = block_header(&mut writer, 5, 0);

        lzh_block(&mut writer, &height_bytes());
        lzh_block(&mut writer, &[1, 2, 3, 4]);

        let light: Vec<u8> = (0..9u16).flat_map(|i| (i * 100).to_le_bytes()).collect();
        lzh_block(&mut writer, &light);

        writer.end_chunk(start);

        let block = TerrainBlock::open_from_bytes(&writer.data).unwrap();

        assert_eq!(block.heights, HEIGHTS.to_vec());
        assert_eq!(block.material(0, 0), Some(MaterialCell { flags: 1, index: 2 }));
        assert_eq!(block.light(1, 1), Some(400));
    }

    #[test]
    fn compressed_heights_raw_tables() {
        let mut writer = ByteWriter::new();
        let start = block_header(&mut writer, 4, 0);
        lzh_block(&mut writer, &height_bytes());
        raw_tables(&mut writer, 0);
        writer.end_chunk(start);

        let block = TerrainBlock::open_from_bytes(&writer.data).unwrap();

        assert_eq!(block.height(0, 1), Some(0.));
        assert_eq!(block.light(0, 1), Some(3));
    }

    #[test]
    fn declared_size_mismatch() {
        let mut writer = ByteWriter::new();
        let start = block_header(&mut writer, 4, 0);
        lzh_block(&mut writer, &height_bytes()[..20]);
        writer.end_chunk(start);

        assert_eq!(
            TerrainBlock::open_from_bytes(&writer.data),
            Err(DecodeError::CompressedSizeMismatch {
                expected: 24,
                actual: 20
            })
        );
    }

    #[test]
    fn unsupported_block_version() {
        let mut writer = ByteWriter::new();
        let start = block_header(&mut writer, 6, 0);
        writer.end_chunk(start);

        assert!(matches!(
            TerrainBlock::open_from_bytes(&writer.data),
            Err(DecodeError::UnsupportedVersion { version: 6, .. })
        ));
    }

    fn block_list(pattern: u32, map: [i32; 2]) -> Vec<u8> {
        let mut writer = ByteWriter::new();
        let start = writer.begin_chunk(GFIL);

        writer.append_u32(1);
        writer.append_i32(2);
        writer.append_i32(1);
        writer.append_i32(-1);
        writer.append_i32(3);
        writer.append_u32(3);
        writer.append_u32(3);
        writer.append_u32(pattern);
        writer.append_u32(2);

        for (id, name) in [(10, "a.dtb"), (11, "bb.dtb")] {
            writer.append_i32(id);
            writer.append_sstring(name);
        }

        map.into_iter().for_each(|entry| writer.append_i32(entry));

        writer.end_chunk(start);
        writer.data
    }

    #[test]
    fn repeating_block_list() {
        let list = TerrainBlockList::open_from_bytes(&block_list(1, [1, -1])).unwrap();

        assert_eq!(list.origin, glam::IVec2::new(-1, 3));
        assert_eq!(list.pattern, TilePattern::Repeat);
        assert_eq!(list.square_size(), 8);
        assert_eq!(list.blocks[1].name, "bb.dtb");
        assert_eq!(list.block_at(0, 0).map(|b| b.id), Some(11));
        assert_eq!(list.block_at(1, 0), None);
        assert_eq!(list.block_at(2, 0).map(|b| b.id), Some(11));
        assert_eq!(list.block_at(-1, 0), None);
        assert_eq!(list.block_at(0, 5).map(|b| b.id), Some(11));
    }

    #[test]
    fn mosaic_block_list() {
        let list = TerrainBlockList::open_from_bytes(&block_list(0, [0, 1])).unwrap();

        assert_eq!(list.pattern, TilePattern::Mosaic);
        assert_eq!(list.block_at(1, 0).map(|b| b.id), Some(11));
        assert_eq!(list.block_at(2, 0), None);
    }

    #[test]
    fn dangling_block_map_entry() {
        assert!(matches!(
            TerrainBlockList::open_from_bytes(&block_list(0, [0, 2])),
            Err(DecodeError::InvalidReference { index: 2, .. })
        ));
    }
}
